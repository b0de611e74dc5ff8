//! Run-event streaming protocol for the storybook generator.
//!
//! The tool engine reports a run as a sequence of [`Frame`]s. The server
//! encodes each frame as one text record on an event stream, and the client
//! decodes the stream incrementally and folds the frames into a [`RunState`].
//!
//! ```
//! use storybook_core::prelude::*;
//!
//! let encoder = RecordEncoder::default();
//! let mut wire = Vec::new();
//! for frame in [
//!     Frame::RunStart(FrameBody::default().with_tool("Story Writer")),
//!     Frame::CallProgress(FrameBody::default().with_output(CallOutput::text("Once..."))),
//!     Frame::run_finish("2026-01-01T00:00:00Z"),
//! ] {
//!     wire.extend_from_slice(&encoder.encode(&frame).unwrap());
//! }
//!
//! let mut decoder = FrameDecoder::new();
//! let reducer = Reducer::default();
//! let mut state = RunState::submitted();
//! for chunk in wire.chunks(5) {
//!     for frame in decoder.feed(chunk) {
//!         state = reducer.apply(state, frame);
//!     }
//! }
//! assert_eq!(state.status, RunStatus::Finished);
//! assert_eq!(state.progress_text, "Once...");
//! ```

/// Incremental record decoder.
pub mod decoder;
/// Public error types.
pub mod errors;
/// The closed set of run events.
pub mod frame;
/// Process-wide logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Folding frames into client-visible run state.
pub mod reducer;
/// Frame to display mapping.
pub mod render;
/// Story submission body.
pub mod request;
/// Record format constants and the encoder.
pub mod wire;

pub use decoder::{DecoderStats, FrameDecoder, decode_stream};
pub use errors::{RequestError, RunInProgress, StreamReadError, WireError};
pub use frame::{CallOutput, Frame, FrameBody, SubCall, ToolInfo};
pub use reducer::{LogPolicy, Reducer, RunState, RunStatus};
pub use render::{
    Rendered, current_tool_line, log_entry, progress_line, render, render_state, status_banner,
};
pub use request::{DEFAULT_STORIES_PATH, MAX_PAGES, StoryRequest};
pub use wire::{EVENT_STREAM_CONTENT_TYPE, RECORD_TAG, RECORD_TERMINATOR, RecordEncoder};
