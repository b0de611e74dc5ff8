use std::time::Duration;

use storybook_core::{RequestError, RunInProgress};

/// Errors returned by the client API.
///
/// Failures of a run that was already submitted are not errors: they end the
/// run in the `Failed` state with the reason recorded there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The story request was rejected before submission.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// A run is still in progress in this session.
    #[error(transparent)]
    RunInProgress(#[from] RunInProgress),
}

/// Why reading the response stream stopped early.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no data received within {0:?}")]
    Timeout(Duration),
}
