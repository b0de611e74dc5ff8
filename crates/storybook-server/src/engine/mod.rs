//! Contract of the external tool engine that produces run frames.
use std::pin::Pin;

use futures::Stream;
use storybook_core::{Frame, StoryRequest};

mod process;

pub use process::ProcessEngine;

/// Stream of frames for one run. The stream ending means the engine
/// completed; an `Err` item means it failed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, EngineError>> + Send + 'static>>;

/// Per-run engine options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOpts {
    pub disable_cache: bool,
    /// Composed script input.
    pub input: String,
}

impl RunOpts {
    /// Options for a story run. Caching is always disabled so no state is
    /// reused across runs.
    pub fn for_story(request: &StoryRequest) -> Self {
        Self {
            disable_cache: true,
            input: request.engine_input(),
        }
    }
}

/// Handle for a started engine run.
pub struct EngineRun {
    pub frames: FrameStream,
}

/// Errors raised by an engine before or during a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be started.
    #[error("failed to start engine `{program}`: {message}")]
    Spawn { program: String, message: String },
    /// Reading engine output failed.
    #[error("engine i/o error: {0}")]
    Io(String),
    /// The engine exited unsuccessfully.
    #[error("engine exited with status {}", exit_status(.code))]
    Exited { code: Option<i32> },
    /// The engine reported a failure of its own.
    #[error("engine error: {0}")]
    Upstream(String),
}

impl EngineError {
    pub fn spawn(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |code| code.to_string())
}

/// A tool engine able to run a script and report its progress as frames.
#[async_trait::async_trait]
pub trait ToolEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Starts `script` with `opts` and returns the run's frame stream.
    async fn start(&self, script: &str, opts: RunOpts) -> Result<EngineRun, EngineError>;
}
