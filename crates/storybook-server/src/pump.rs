use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt as _;
use storybook_core::{Frame, RecordEncoder};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::engine::{FrameStream, RunOpts, ToolEngine};

/// Encoded records of one run, ready to be used as a response body.
pub type RecordStream = ReceiverStream<Result<Bytes, Infallible>>;

/// Starts one engine run on its own task and returns the record stream.
///
/// The stream always ends with exactly one terminal record: the engine's own
/// `runFinish`, an error record when the engine fails, or a synthesized
/// `runFinish` when the engine completes without sending one. After the
/// terminal record the response ends and the engine is left to finish on its
/// own. The task stops early only when the receiver is dropped.
pub fn spawn_run(
    engine: Arc<dyn ToolEngine>,
    script: String,
    opts: RunOpts,
    encoder: RecordEncoder,
    capacity: usize,
) -> RecordStream {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let run_id = uuid::Uuid::new_v4();
    tokio::spawn(pump_run(run_id, engine, script, opts, encoder, tx));
    ReceiverStream::new(rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sent {
    Delivered,
    Skipped,
    Closed,
}

async fn pump_run(
    run_id: uuid::Uuid,
    engine: Arc<dyn ToolEngine>,
    script: String,
    opts: RunOpts,
    encoder: RecordEncoder,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
) {
    info!(%run_id, engine = engine.name(), script = %script, "run started");
    let mut run = match engine.start(&script, opts).await {
        Ok(run) => run,
        Err(err) => {
            warn!(%run_id, error = %err, "engine failed to start");
            send_frame(&tx, &encoder, &Frame::run_error(err.to_string(), now())).await;
            return;
        }
    };

    let mut frames = 0_u64;
    let terminal_sent = loop {
        let Some(next) = run.frames.next().await else {
            break false;
        };
        match next {
            Ok(frame) => {
                frames = frames.saturating_add(1);
                debug!(%run_id, kind = frame.kind(), seq = frames, "engine frame");
                match send_frame(&tx, &encoder, &frame).await {
                    Sent::Closed => {
                        info!(%run_id, "client went away; stopping run");
                        return;
                    }
                    Sent::Delivered if frame.is_terminal() => {
                        info!(%run_id, frames, failed = frame.error_message().is_some(), "run finished");
                        break true;
                    }
                    // An unencodable terminal frame still needs a terminal record.
                    Sent::Skipped if frame.is_terminal() => break false,
                    Sent::Delivered | Sent::Skipped => {}
                }
            }
            Err(err) => {
                warn!(%run_id, frames, error = %err, "engine run failed");
                send_frame(&tx, &encoder, &Frame::run_error(err.to_string(), now())).await;
                return;
            }
        }
    };

    if !terminal_sent {
        info!(%run_id, frames, "engine sent no usable terminal frame; closing run");
        send_frame(&tx, &encoder, &Frame::run_finish(now())).await;
    }
    // Let the engine run to completion instead of dropping (and killing) it.
    drop(tx);
    drain(run_id, run.frames).await;
}

async fn drain(run_id: uuid::Uuid, mut frames: FrameStream) {
    let mut ignored = 0_u64;
    while let Some(next) = frames.next().await {
        match next {
            Ok(frame) => {
                ignored = ignored.saturating_add(1);
                debug!(%run_id, kind = frame.kind(), "ignoring frame after terminal record");
            }
            Err(err) => warn!(%run_id, error = %err, "engine failed after terminal record"),
        }
    }
    if ignored > 0 {
        warn!(%run_id, ignored, "engine sent frames after its terminal record");
    }
}

async fn send_frame(
    tx: &mpsc::Sender<Result<Bytes, Infallible>>,
    encoder: &RecordEncoder,
    frame: &Frame,
) -> Sent {
    let Some(record) = encoder.encode_or_skip(frame) else {
        return Sent::Skipped;
    };
    if tx.send(Ok(record)).await.is_ok() {
        Sent::Delivered
    } else {
        Sent::Closed
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
