use tracing::{debug, trace};

use crate::errors::RunInProgress;
use crate::frame::Frame;

/// Lifecycle of one run as seen by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RunStatus {
    #[default]
    NotStarted,
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    /// `Finished` and `Failed` are final for a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::Failed)
    }
}

/// Client-visible state of one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunState {
    /// Content of the latest progress frame; overwritten on every update.
    pub progress_text: String,
    /// Description of the latest tool that announced itself.
    pub current_tool: String,
    /// Frames not folded into the fields above, in arrival order.
    pub event_log: Vec<Frame>,
    pub status: RunStatus,
    /// Why a `Failed` run failed.
    pub failure: Option<String>,
}

impl RunState {
    /// Fresh state for a newly submitted run.
    pub fn submitted() -> Self {
        Self {
            status: RunStatus::Running,
            ..Self::default()
        }
    }

    /// Starts a new run from this state.
    ///
    /// Rejected while the current run is still `Running`; any other state is
    /// replaced by a fresh one.
    pub fn begin(&self) -> Result<RunState, RunInProgress> {
        if self.status == RunStatus::Running {
            return Err(RunInProgress);
        }
        Ok(Self::submitted())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Whether transient progress frames are also kept in the event log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogPolicy {
    /// `callStart` and `callProgress` only update the progress fields.
    #[default]
    ConsumeProgress,
    /// They update the progress fields and are appended to the event log.
    RetainProgress,
}

/// Folds frames into a [`RunState`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Reducer {
    policy: LogPolicy,
}

impl Reducer {
    pub fn new(policy: LogPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LogPolicy {
        self.policy
    }

    /// Applies one frame.
    ///
    /// Frames are only applied to a `Running` state. Once a run is terminal
    /// the state never changes again.
    pub fn apply(&self, mut state: RunState, frame: Frame) -> RunState {
        if state.status != RunStatus::Running {
            trace!(kind = frame.kind(), status = ?state.status, "dropping frame outside a running run");
            return state;
        }

        let logged = match &frame {
            Frame::CallProgress(body) => {
                if let Some(content) = body.last_output_content() {
                    state.progress_text = content.to_owned();
                }
                if let Some(description) = body.tool_description() {
                    state.current_tool = description.to_owned();
                }
                self.policy == LogPolicy::RetainProgress
            }
            Frame::CallStart(body) => {
                if let Some(description) = body.tool_description() {
                    state.current_tool = description.to_owned();
                }
                self.policy == LogPolicy::RetainProgress
            }
            Frame::RunFinish(body) => {
                match body.error_message() {
                    Some(message) => {
                        debug!(error = message, "run finished with an error");
                        state.status = RunStatus::Failed;
                        state.failure = Some(message.to_owned());
                    }
                    None => {
                        debug!("run finished");
                        state.status = RunStatus::Finished;
                    }
                }
                false
            }
            Frame::RunStart(_)
            | Frame::CallChat(_)
            | Frame::CallFinish(_)
            | Frame::CallContinue(_)
            | Frame::CallConfirm(_)
            | Frame::CallSubCalls(_)
            | Frame::Unknown { .. } => true,
        };
        if logged {
            state.event_log.push(frame);
        }
        state
    }

    /// Forces a transport-level failure, bypassing frame dispatch.
    pub fn fail(&self, mut state: RunState, reason: impl Into<String>) -> RunState {
        if state.is_terminal() {
            return state;
        }
        let reason = reason.into();
        debug!(reason = %reason, "run failed");
        state.status = RunStatus::Failed;
        state.failure = Some(reason);
        state
    }

    /// Settles the state once the byte stream has ended.
    ///
    /// A run still `Running` at that point never received its terminal
    /// record and is failed.
    pub fn finish_stream(&self, state: RunState) -> RunState {
        if state.status == RunStatus::Running {
            return self.fail(state, "stream ended without a terminal record");
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CallOutput, FrameBody, SubCall};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fold(reducer: &Reducer, state: RunState, frames: Vec<Frame>) -> RunState {
        frames
            .into_iter()
            .fold(state, |state, frame| reducer.apply(state, frame))
    }

    fn every_kind() -> Vec<Frame> {
        vec![
            Frame::RunStart(FrameBody::default().with_tool("Story Writer")),
            Frame::CallStart(FrameBody::default().with_tool("Draft")),
            Frame::CallChat(FrameBody::default().with_input("prompt")),
            Frame::CallProgress(FrameBody::default().with_output(CallOutput::text("..."))),
            Frame::CallFinish(FrameBody::default().with_output(CallOutput::text("done"))),
            Frame::CallContinue(FrameBody::default()),
            Frame::CallConfirm(FrameBody::default()),
            Frame::CallSubCalls(FrameBody::default().with_output(
                CallOutput::text("").with_sub_call("c1", SubCall::new("t", "i")),
            )),
            Frame::Unknown {
                kind: "callPause".into(),
                payload: json!({"type": "callPause"}),
            },
        ]
    }

    #[test]
    fn story_scenario_ends_finished_with_only_run_start_logged() {
        let run_start = Frame::RunStart(FrameBody::default().with_tool("Story Writer"));
        let state = fold(
            &Reducer::default(),
            RunState::submitted(),
            vec![
                run_start.clone(),
                Frame::CallStart(FrameBody::default().with_tool("Draft Page 1")),
                Frame::CallProgress(
                    FrameBody::default().with_output(CallOutput::text("Once upon a time...")),
                ),
                Frame::run_finish("2026-01-01T00:00:00Z"),
            ],
        );

        assert_eq!(
            state,
            RunState {
                progress_text: "Once upon a time...".into(),
                current_tool: "Draft Page 1".into(),
                event_log: vec![run_start],
                status: RunStatus::Finished,
                failure: None,
            }
        );
    }

    #[test]
    fn event_log_grows_only_for_logged_kinds() {
        let reducer = Reducer::default();
        let mut state = RunState::submitted();
        for frame in every_kind() {
            let before = state.event_log.len();
            let expect_logged = !matches!(frame, Frame::CallStart(_) | Frame::CallProgress(_));
            state = reducer.apply(state, frame);
            let after = state.event_log.len();
            assert!(after >= before);
            assert_eq!(after > before, expect_logged);
        }
        assert_eq!(state.event_log.len(), 7);
        assert_eq!(state.status, RunStatus::Running);
    }

    #[test]
    fn retain_policy_logs_progress_frames_too() {
        let reducer = Reducer::new(LogPolicy::RetainProgress);
        let state = fold(&reducer, RunState::submitted(), every_kind());
        assert_eq!(state.event_log.len(), 9);
        assert_eq!(state.current_tool, "Draft");
        assert_eq!(state.progress_text, "...");
    }

    #[test]
    fn progress_without_tool_or_output_keeps_previous_values() {
        let reducer = Reducer::default();
        let state = fold(
            &reducer,
            RunState::submitted(),
            vec![
                Frame::CallStart(FrameBody::default().with_tool("Draft Page 2")),
                Frame::CallProgress(FrameBody::default().with_output(CallOutput::text("a"))),
                Frame::CallProgress(FrameBody::default()),
                Frame::CallStart(FrameBody::default()),
            ],
        );
        assert_eq!(state.current_tool, "Draft Page 2");
        assert_eq!(state.progress_text, "a");
    }

    #[test]
    fn terminal_states_ignore_further_frames_and_failures() {
        let reducer = Reducer::default();
        let finished = reducer.apply(RunState::submitted(), Frame::run_finish("t"));
        let failed = reducer.fail(RunState::submitted(), "connection reset");

        for terminal in [finished, failed] {
            let mut state = terminal.clone();
            for frame in every_kind()
                .into_iter()
                .chain([Frame::run_finish("t2"), Frame::run_error("late", "t3")])
            {
                state = reducer.apply(state, frame);
            }
            state = reducer.fail(state, "late transport error");
            state = reducer.finish_stream(state);
            assert_eq!(state, terminal);
        }
    }

    #[test]
    fn explicit_error_record_fails_the_run() {
        let state = Reducer::default().apply(
            RunState::submitted(),
            Frame::run_error("engine exited with status 1", "t"),
        );
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.failure.as_deref(), Some("engine exited with status 1"));
        assert!(state.event_log.is_empty());
    }

    #[test]
    fn stream_end_without_terminal_record_fails_the_run() {
        let reducer = Reducer::default();
        let state = reducer.apply(
            RunState::submitted(),
            Frame::RunStart(FrameBody::default()),
        );
        let state = reducer.finish_stream(state);
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.event_log.len(), 1);
    }

    #[test]
    fn frames_before_submission_are_ignored() {
        let state = Reducer::default().apply(
            RunState::default(),
            Frame::RunStart(FrameBody::default()),
        );
        assert_eq!(state, RunState::default());
    }

    #[test]
    fn begin_rejects_a_second_concurrent_run() {
        let running = RunState::submitted();
        assert_eq!(running.begin(), Err(RunInProgress));

        let idle = RunState::default().begin().expect("idle can start");
        assert_eq!(idle, RunState::submitted());

        let mut finished = Reducer::default().apply(
            RunState::submitted(),
            Frame::RunStart(FrameBody::default()),
        );
        finished = Reducer::default().apply(finished, Frame::run_finish("t"));
        assert_eq!(finished.begin().expect("restart"), RunState::submitted());
    }
}
