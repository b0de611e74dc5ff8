use std::process::Stdio;

use futures::stream;
use storybook_core::Frame;
use tokio::io::{AsyncBufReadExt as _, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use super::{EngineError, EngineRun, RunOpts, ToolEngine};

/// Runs the engine as a child process.
///
/// The process is invoked as
/// `<program> [extra args..] [--disable-cache] <script> <input>` and must
/// print one JSON frame per line on stdout. Its stderr is passed through.
/// A non-zero exit status is reported as a failure after all printed frames.
#[derive(Clone, Debug)]
pub struct ProcessEngine {
    program: String,
    extra_args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Adds arguments placed before the per-run arguments.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self, script: &str, opts: &RunOpts) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.extra_args);
        if opts.disable_cache {
            command.arg("--disable-cache");
        }
        command
            .arg(script)
            .arg(&opts.input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

#[async_trait::async_trait]
impl ToolEngine for ProcessEngine {
    fn name(&self) -> &str {
        &self.program
    }

    async fn start(&self, script: &str, opts: RunOpts) -> Result<EngineRun, EngineError> {
        let mut child = self
            .command(script, &opts)
            .spawn()
            .map_err(|e| EngineError::spawn(&self.program, e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::io("engine stdout was not captured"))?;
        debug!(program = %self.program, script, pid = ?child.id(), "engine process started");

        Ok(EngineRun {
            frames: Box::pin(frame_lines(child, BufReader::new(stdout).lines())),
        })
    }
}

fn frame_lines(
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
) -> impl futures::Stream<Item = Result<Frame, EngineError>> + Send {
    struct State {
        child: Child,
        lines: Lines<BufReader<ChildStdout>>,
    }

    stream::try_unfold(State { child, lines }, |mut state| async move {
        loop {
            let next = state
                .lines
                .next_line()
                .await
                .map_err(|e| EngineError::io(format!("reading engine output failed: {e}")))?;
            let Some(line) = next else {
                let status = state
                    .child
                    .wait()
                    .await
                    .map_err(|e| EngineError::io(format!("waiting for engine failed: {e}")))?;
                if status.success() {
                    return Ok(None);
                }
                return Err(EngineError::Exited {
                    code: status.code(),
                });
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Frame>(line) {
                Ok(frame) => return Ok(Some((frame, state))),
                Err(err) => warn!(error = %err, "skipping engine output line that is not a frame"),
            }
        }
    })
}
