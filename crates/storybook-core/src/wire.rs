use bytes::{BufMut as _, Bytes, BytesMut};
use tracing::warn;

use crate::errors::WireError;
use crate::frame::Frame;

/// Prefix of every record. Encoder and decoder must agree on it byte for byte,
/// trailing space included.
pub const RECORD_TAG: &str = "event: ";
/// A blank line ends a record.
pub const RECORD_TERMINATOR: &str = "\n\n";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Serializes frames into `<tag><json><terminator>` records.
#[derive(Clone, Debug)]
pub struct RecordEncoder {
    tag: String,
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::with_tag(RECORD_TAG)
    }
}

impl RecordEncoder {
    /// Creates an encoder with a custom record tag.
    ///
    /// Only useful for interop testing; production streams use [`RECORD_TAG`].
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Encodes one frame as a complete wire record.
    pub fn encode(&self, frame: &Frame) -> Result<Bytes, WireError> {
        let json = serde_json::to_string(frame)
            .map_err(|e| WireError::serialize(frame.kind(), e.to_string()))?;
        let mut buf =
            BytesMut::with_capacity(self.tag.len() + json.len() + RECORD_TERMINATOR.len());
        buf.put_slice(self.tag.as_bytes());
        buf.put_slice(json.as_bytes());
        buf.put_slice(RECORD_TERMINATOR.as_bytes());
        Ok(buf.freeze())
    }

    /// Like [`encode`](Self::encode), but logs and skips frames that cannot be
    /// serialized instead of failing the stream.
    pub fn encode_or_skip(&self, frame: &Frame) -> Option<Bytes> {
        match self.encode(frame) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(kind = frame.kind(), error = %err, "skipping frame that could not be encoded");
                None
            }
        }
    }
}
