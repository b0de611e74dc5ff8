use std::fmt;
use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt as _, stream};
use storybook_core::{
    FrameDecoder, LogPolicy, RECORD_TAG, Reducer, RunInProgress, RunState, RunStatus,
    decode_stream,
};
use tracing::{debug, warn};

use crate::errors::ReadFailure;
use crate::observer::RunObserver;

/// Client-side state of consecutive runs.
///
/// A session holds at most one active run. A new run can be submitted once
/// the previous one is `Finished` or `Failed`.
#[derive(Clone, Debug)]
pub struct RunSession {
    state: RunState,
    reducer: Reducer,
    tag: String,
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new(LogPolicy::default())
    }
}

impl RunSession {
    pub fn new(policy: LogPolicy) -> Self {
        Self {
            state: RunState::default(),
            reducer: Reducer::new(policy),
            tag: RECORD_TAG.to_string(),
        }
    }

    /// Overrides the record tag the decoder looks for.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Resets to a fresh `Running` state for a new submission.
    pub fn submit(&mut self) -> Result<(), RunInProgress> {
        self.state = self.state.begin()?;
        Ok(())
    }

    /// Fails the active run. Has no effect once the run is terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let state = std::mem::take(&mut self.state);
        self.state = self.reducer.fail(state, reason);
    }

    /// Reads `bytes` to the end of the run and returns its final status.
    ///
    /// Without a submitted run nothing is read and the current status is
    /// returned.
    ///
    /// Reading stops at the first terminal frame. A read error, a gap longer
    /// than `read_timeout` between chunks, or an end of input without a
    /// terminal frame fails the run.
    pub async fn drive<S, B, E>(
        &mut self,
        bytes: S,
        read_timeout: Duration,
        observer: &mut impl RunObserver,
    ) -> RunStatus
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: fmt::Display,
    {
        if self.state.status != RunStatus::Running {
            debug!(status = ?self.state.status, "no run in progress; not reading the stream");
            return self.state.status;
        }
        let decoder = FrameDecoder::with_tag(self.tag.clone());
        let mut frames = pin!(decode_stream(
            with_read_deadline(bytes, read_timeout),
            decoder
        ));

        while let Some(next) = frames.next().await {
            match next {
                Ok(frame) => {
                    let state = std::mem::take(&mut self.state);
                    self.state = self.reducer.apply(state, frame.clone());
                    observer.on_frame(&frame, &self.state);
                    if self.state.is_terminal() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "run stream interrupted");
                    self.fail(err.to_string());
                    break;
                }
            }
        }

        let state = std::mem::take(&mut self.state);
        self.state = self.reducer.finish_stream(state);
        debug!(status = ?self.state.status, logged = self.state.event_log.len(), "run settled");
        observer.on_status(&self.state);
        self.state.status
    }
}

/// Fails the stream when no chunk arrives within `timeout`.
fn with_read_deadline<S, B, E>(
    bytes: S,
    timeout: Duration,
) -> impl Stream<Item = Result<B, ReadFailure>>
where
    S: Stream<Item = Result<B, E>>,
    E: fmt::Display,
{
    stream::unfold(Some(Box::pin(bytes)), move |bytes| async move {
        let mut bytes = bytes?;
        match tokio::time::timeout(timeout, bytes.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(bytes))),
            Ok(Some(Err(err))) => Some((Err(ReadFailure::Transport(err.to_string())), None)),
            Ok(None) => None,
            Err(_) => Some((Err(ReadFailure::Timeout(timeout)), None)),
        }
    })
}
