use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub const RUN_START: &str = "runStart";
pub const CALL_START: &str = "callStart";
pub const CALL_CHAT: &str = "callChat";
pub const CALL_PROGRESS: &str = "callProgress";
pub const CALL_FINISH: &str = "callFinish";
pub const CALL_CONTINUE: &str = "callContinue";
pub const CALL_CONFIRM: &str = "callConfirm";
pub const CALL_SUB_CALLS: &str = "callSubCalls";
pub const RUN_FINISH: &str = "runFinish";

/// One execution event emitted by the tool engine.
///
/// The wire shape is a flat JSON object discriminated by `type`. Types this
/// crate does not know about are kept as [`Frame::Unknown`] with the original
/// object so they can still be logged and rendered.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    RunStart(FrameBody),
    CallStart(FrameBody),
    CallChat(FrameBody),
    CallProgress(FrameBody),
    CallFinish(FrameBody),
    CallContinue(FrameBody),
    CallConfirm(FrameBody),
    CallSubCalls(FrameBody),
    RunFinish(FrameBody),
    Unknown { kind: String, payload: Value },
}

/// Fields shared by every known frame type. All of them are optional on the
/// wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameBody {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolInfo>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub input: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient_outputs"
    )]
    pub output: Vec<CallOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,
    /// Failure text reported by the engine. A `runFinish` carrying a
    /// non-empty error is the explicit error record of the protocol.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub error: Option<String>,
    /// Fields this crate does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_opt_string"
    )]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One element of a frame's `output` sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOutput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(rename = "subCalls", default, skip_serializing_if = "Option::is_none")]
    pub sub_calls: Option<BTreeMap<String, SubCall>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A nested invocation spawned by a tool call, keyed by its call id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubCall {
    #[serde(rename = "toolID", default, deserialize_with = "lenient_string")]
    pub tool_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub input: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Frame {
    /// Returns the wire `type` of this frame.
    pub fn kind(&self) -> &str {
        match self {
            Frame::RunStart(_) => RUN_START,
            Frame::CallStart(_) => CALL_START,
            Frame::CallChat(_) => CALL_CHAT,
            Frame::CallProgress(_) => CALL_PROGRESS,
            Frame::CallFinish(_) => CALL_FINISH,
            Frame::CallContinue(_) => CALL_CONTINUE,
            Frame::CallConfirm(_) => CALL_CONFIRM,
            Frame::CallSubCalls(_) => CALL_SUB_CALLS,
            Frame::RunFinish(_) => RUN_FINISH,
            Frame::Unknown { kind, .. } => kind,
        }
    }

    /// Returns the typed body, or `None` for unknown frames.
    pub fn body(&self) -> Option<&FrameBody> {
        match self {
            Frame::RunStart(body)
            | Frame::CallStart(body)
            | Frame::CallChat(body)
            | Frame::CallProgress(body)
            | Frame::CallFinish(body)
            | Frame::CallContinue(body)
            | Frame::CallConfirm(body)
            | Frame::CallSubCalls(body)
            | Frame::RunFinish(body) => Some(body),
            Frame::Unknown { .. } => None,
        }
    }

    /// True for the record that ends a run, successful or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::RunFinish(_))
    }

    /// Returns the engine error carried by a terminal frame.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Frame::RunFinish(body) => body.error_message(),
            _ => None,
        }
    }

    /// Successful terminal record.
    pub fn run_finish(end: impl Into<Value>) -> Self {
        Frame::RunFinish(FrameBody::default().with_end(end))
    }

    /// Terminal record reporting an upstream failure.
    pub fn run_error(message: impl Into<String>, end: impl Into<Value>) -> Self {
        Frame::RunFinish(FrameBody {
            error: Some(message.into()),
            ..FrameBody::default().with_end(end)
        })
    }

    fn known(kind: &str) -> Option<fn(FrameBody) -> Frame> {
        let ctor: fn(FrameBody) -> Frame = match kind {
            RUN_START => Frame::RunStart,
            CALL_START => Frame::CallStart,
            CALL_CHAT => Frame::CallChat,
            CALL_PROGRESS => Frame::CallProgress,
            CALL_FINISH => Frame::CallFinish,
            CALL_CONTINUE => Frame::CallContinue,
            CALL_CONFIRM => Frame::CallConfirm,
            CALL_SUB_CALLS => Frame::CallSubCalls,
            RUN_FINISH => Frame::RunFinish,
            _ => return None,
        };
        Some(ctor)
    }
}

impl FrameBody {
    pub fn tool_description(&self) -> Option<&str> {
        self.tool.as_ref().and_then(|tool| tool.description.as_deref())
    }

    /// Content of the last `output` element, if any.
    pub fn last_output_content(&self) -> Option<&str> {
        self.output.last().map(|output| output.content.as_str())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|message| !message.trim().is_empty())
    }

    pub fn with_tool(mut self, description: impl Into<String>) -> Self {
        self.tool = Some(ToolInfo {
            description: Some(description.into()),
            extra: Map::new(),
        });
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_output(mut self, output: CallOutput) -> Self {
        self.output.push(output);
        self
    }

    pub fn with_end(mut self, end: impl Into<Value>) -> Self {
        self.end = Some(end.into());
        self
    }
}

impl CallOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_sub_call(mut self, id: impl Into<String>, sub_call: SubCall) -> Self {
        self.sub_calls
            .get_or_insert_with(BTreeMap::new)
            .insert(id.into(), sub_call);
        self
    }
}

impl SubCall {
    pub fn new(tool_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            input: input.into(),
            extra: Map::new(),
        }
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a> {
            #[serde(rename = "type")]
            kind: &'a str,
            #[serde(flatten)]
            body: &'a FrameBody,
        }

        match self {
            Frame::Unknown { kind, payload } => match payload {
                Value::Object(map) if !map.contains_key("type") => {
                    let mut map = map.clone();
                    map.insert("type".into(), Value::String(kind.clone()));
                    map.serialize(serializer)
                }
                _ => payload.serialize(serializer),
            },
            known => match known.body() {
                Some(body) => Tagged {
                    kind: known.kind(),
                    body,
                }
                .serialize(serializer),
                None => Err(serde::ser::Error::custom("frame has no body")),
            },
        }
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Value::Object(mut map) = Value::deserialize(deserializer)? else {
            return Err(D::Error::custom("frame must be a JSON object"));
        };
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(D::Error::custom("frame `type` must be a string")),
            None => return Err(D::Error::missing_field("type")),
        };
        let Some(ctor) = Frame::known(&kind) else {
            return Ok(Frame::Unknown {
                kind,
                payload: Value::Object(map),
            });
        };
        map.remove("type");
        let body = FrameBody::deserialize(Value::Object(map)).map_err(D::Error::custom)?;
        Ok(ctor(body))
    }
}

// The engine is not strict about string fields; anything else is kept as its
// JSON text rather than failing the whole record.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

// `output` is a list of objects on call frames, but run frames carry a plain
// string. Strings become text outputs; an empty string means no output.
fn lenient_outputs<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<CallOutput>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| output_from_value(item).map_err(D::Error::custom))
            .collect(),
        Value::String(text) if text.is_empty() => Ok(Vec::new()),
        other => output_from_value(other)
            .map(|output| vec![output])
            .map_err(D::Error::custom),
    }
}

fn output_from_value(value: Value) -> Result<CallOutput, serde_json::Error> {
    match value {
        Value::Object(_) => CallOutput::deserialize(value),
        Value::String(text) => Ok(CallOutput::text(text)),
        other => Ok(CallOutput::text(other.to_string())),
    }
}
