/// Errors raised while turning a frame into a wire record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The frame could not be serialized to JSON.
    #[error("failed to serialize `{kind}` frame: {message}")]
    Serialize { kind: String, message: String },
}

impl WireError {
    /// Creates a serialization error for a frame of the given type.
    pub fn serialize(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialize {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Failure surfaced by a lazily decoded frame stream.
///
/// Malformed or untagged records never show up here; they are dropped by the
/// decoder. Only failures of the underlying byte source end the stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamReadError {
    /// The byte source returned an error.
    #[error("stream read failed: {0}")]
    Read(String),
}

impl StreamReadError {
    pub(crate) fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }
}

/// Story submission rejected before any run was started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("validation error: {0}")]
    Validation(String),
}

impl RequestError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Returned when a run is submitted while another one is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a run is already in progress")]
pub struct RunInProgress;
