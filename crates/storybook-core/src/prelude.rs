//! Common imports for code that produces or consumes run streams.
pub use crate::{
    CallOutput, Frame, FrameBody, FrameDecoder, LogPolicy, Reducer, RecordEncoder, Rendered,
    RunState, RunStatus, StoryRequest, SubCall, render,
};
