use std::io::Write;

use storybook_core::{
    Frame, Rendered, RunState, current_tool_line, log_entry, progress_line, status_banner,
};
use tracing::warn;

use crate::observer::RunObserver;

/// Prints a run to a terminal as it unfolds.
///
/// New event-log entries are printed once, and the current tool and progress
/// lines only when they change.
pub struct TerminalPrinter<W: Write> {
    out: W,
    printed: usize,
    tool: String,
    progress: String,
}

impl<W: Write> TerminalPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            tool: String::new(),
            progress: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, item: &Rendered) {
        if let Err(err) = write!(self.out, "{item}").and_then(|()| self.out.flush()) {
            warn!(error = %err, "failed to write run output");
        }
    }
}

impl<W: Write> RunObserver for TerminalPrinter<W> {
    fn on_frame(&mut self, _frame: &Frame, state: &RunState) {
        // A fresh run starts with an empty log.
        self.printed = self.printed.min(state.event_log.len());
        for frame in &state.event_log[self.printed..] {
            self.emit(&log_entry(frame));
        }
        self.printed = state.event_log.len();

        if state.current_tool != self.tool {
            self.tool.clone_from(&state.current_tool);
            self.emit(&current_tool_line(&state.current_tool));
        }
        if state.progress_text != self.progress {
            self.progress.clone_from(&state.progress_text);
            self.emit(&progress_line(&state.progress_text));
        }
    }

    fn on_status(&mut self, state: &RunState) {
        if !state.is_terminal() {
            self.printed = 0;
            self.tool.clear();
            self.progress.clear();
        }
        self.emit(&Rendered::Line(status_banner(state)));
    }
}
