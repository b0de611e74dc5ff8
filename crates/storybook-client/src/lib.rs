//! Client for the storybook run-event stream.
//!
//! [`StoryClient`] submits a [`StoryRequest`](storybook_core::StoryRequest)
//! and drives a [`RunSession`] from the response body, folding every decoded
//! frame into the session's run state and reporting updates to a
//! [`RunObserver`].

pub mod client;
pub mod config;
pub mod errors;
pub mod observer;
pub mod printer;
pub mod session;

pub use client::StoryClient;
pub use config::{Args, ClientConfig, load_env};
pub use errors::{ClientError, ReadFailure};
pub use observer::RunObserver;
pub use printer::TerminalPrinter;
pub use session::RunSession;
