use std::fmt;

use serde_json::Value;

use crate::frame::{CallOutput, Frame, FrameBody};
use crate::reducer::{RunState, RunStatus};

/// Display-agnostic description of how a frame should be shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rendered {
    Line(String),
    Section { title: String, body: Vec<Rendered> },
    SubCall {
        id: String,
        tool_id: String,
        input: String,
    },
    /// Structural dump, shown as-is.
    Preformatted(String),
}

impl Rendered {
    /// Ids of every sub-call in this tree, in render order.
    pub fn sub_call_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_sub_call_ids(&mut ids);
        ids
    }

    fn collect_sub_call_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            Rendered::SubCall { id, .. } => ids.push(id),
            Rendered::Section { body, .. } => {
                for child in body {
                    child.collect_sub_call_ids(ids);
                }
            }
            Rendered::Line(_) | Rendered::Preformatted(_) => {}
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Rendered::Line(text) => writeln!(f, "{pad}{text}"),
            Rendered::Section { title, body } => {
                writeln!(f, "{pad}{title}")?;
                for child in body {
                    child.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
            Rendered::SubCall { id, tool_id, input } => {
                writeln!(f, "{pad}Subcall {id}:")?;
                writeln!(f, "{pad}  Tool ID: {tool_id}")?;
                writeln!(f, "{pad}  Input: {input}")
            }
            Rendered::Preformatted(text) => {
                for line in text.lines() {
                    writeln!(f, "{pad}{line}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Maps a frame to its renderable description.
pub fn render(frame: &Frame) -> Rendered {
    match frame {
        Frame::RunStart(body) => Rendered::Line(format!(
            "Tool starting: {}",
            body.tool_description().unwrap_or_default()
        )),
        Frame::CallStart(body) => Rendered::Line(format!(
            "Call started: {}",
            body.tool_description().unwrap_or_default()
        )),
        Frame::CallChat(body) => Rendered::Line(format!(
            "Chat in progress with input >> {}",
            body.input.as_deref().unwrap_or_default()
        )),
        Frame::CallProgress(body) => Rendered::Line(format!(
            "Progress: {}",
            body.last_output_content().unwrap_or_default()
        )),
        Frame::CallFinish(body) => Rendered::Section {
            title: "Call finished:".into(),
            body: body
                .output
                .iter()
                .map(|output| Rendered::Line(output.content.clone()))
                .collect(),
        },
        Frame::CallContinue(body) => outputs_section("Call continue:", body),
        Frame::CallConfirm(body) => outputs_section("Call confirm:", body),
        Frame::CallSubCalls(body) => outputs_section("Sub-calls in progress:", body),
        Frame::RunFinish(body) => match body.error_message() {
            Some(message) => Rendered::Line(format!("Run failed: {message}")),
            None => Rendered::Line(format!("Run finished at {}", display_value(body.end.as_ref()))),
        },
        Frame::Unknown { payload, .. } => Rendered::Preformatted(
            serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string()),
        ),
    }
}

fn outputs_section(title: &str, body: &FrameBody) -> Rendered {
    Rendered::Section {
        title: title.into(),
        body: body.output.iter().map(render_output).collect(),
    }
}

fn render_output(output: &CallOutput) -> Rendered {
    let Some(sub_calls) = output.sub_calls.as_ref().filter(|calls| !calls.is_empty()) else {
        return Rendered::Line(output.content.clone());
    };
    Rendered::Section {
        title: output.content.clone(),
        body: sub_calls
            .iter()
            .map(|(id, call)| Rendered::SubCall {
                id: id.clone(),
                tool_id: call.tool_id.clone(),
                input: call.input.clone(),
            })
            .collect(),
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "an unknown time".into(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Renders the whole run view: status banner, event log, current tool and
/// latest progress.
pub fn render_state(state: &RunState) -> Vec<Rendered> {
    let mut view = vec![Rendered::Line(status_banner(state))];
    view.extend(state.event_log.iter().map(log_entry));
    if !state.current_tool.is_empty() {
        view.push(current_tool_line(&state.current_tool));
    }
    view.push(progress_line(&state.progress_text));
    view
}

/// One event-log entry as shown in the run view.
pub fn log_entry(frame: &Frame) -> Rendered {
    Rendered::Section {
        title: ">>".into(),
        body: vec![render(frame)],
    }
}

pub fn current_tool_line(tool: &str) -> Rendered {
    Rendered::Line(format!("-----[current tool]---- {tool}"))
}

pub fn progress_line(progress: &str) -> Rendered {
    Rendered::Line(format!(">> {progress}"))
}

/// One-line summary of where the run stands.
pub fn status_banner(state: &RunState) -> String {
    match state.status {
        RunStatus::NotStarted => "Waiting for you to generate a story...".into(),
        RunStatus::Running => "--- [AI story teller has started] ---".into(),
        RunStatus::Finished => "--- [story complete] ---".into(),
        RunStatus::Failed => format!(
            "--- [run failed: {}] ---",
            state.failure.as_deref().unwrap_or("unknown error")
        ),
    }
}
