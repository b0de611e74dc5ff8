use storybook_core::{RunStatus, StoryRequest};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::errors::{ClientError, ReadFailure};
use crate::observer::RunObserver;
use crate::session::RunSession;

/// HTTP client for the storybook server.
#[derive(Clone, Debug)]
pub struct StoryClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl StoryClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// New session using the configured log policy.
    pub fn session(&self) -> RunSession {
        RunSession::new(self.config.log_policy)
    }

    /// Submits `request` and follows the run until it settles.
    ///
    /// Requests that fail validation, or a session with a run still in
    /// progress, are rejected without contacting the server. Once submitted,
    /// every failure ends the run as `Failed` and is recorded in the session.
    pub async fn run(
        &self,
        session: &mut RunSession,
        request: &StoryRequest,
        observer: &mut impl RunObserver,
    ) -> Result<RunStatus, ClientError> {
        request.validate()?;
        session.submit()?;
        observer.on_status(session.state());
        info!(pages = request.pages, path = %request.path, "story submitted");

        let response = match self
            .http
            .post(self.config.run_url())
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let failure = ReadFailure::Transport(format!("story request failed: {err}"));
                return Ok(self.settle(session, failure.to_string(), observer));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let reason = format!("story request failed with status {status}: {body}");
            return Ok(self.settle(session, reason, observer));
        }

        debug!(%status, "run stream opened");
        Ok(session
            .drive(response.bytes_stream(), self.config.read_timeout, observer)
            .await)
    }

    fn settle(
        &self,
        session: &mut RunSession,
        reason: String,
        observer: &mut impl RunObserver,
    ) -> RunStatus {
        warn!(reason = %reason, "run failed before streaming");
        session.fail(reason);
        observer.on_status(session.state());
        session.state().status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use storybook_core::RequestError;

    fn client() -> StoryClient {
        // Nothing listens on the discard port.
        StoryClient::new(
            ClientConfig::new("http://127.0.0.1:9").connect_timeout(Duration::from_millis(500)),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_submission() {
        let client = client();
        let mut session = client.session();
        let err = client
            .run(&mut session, &StoryRequest::new("robots", 0), &mut ())
            .await
            .expect_err("invalid pages");

        assert!(matches!(err, ClientError::Request(RequestError::Validation(_))));
        assert_eq!(session.state().status, RunStatus::NotStarted);
    }

    #[tokio::test]
    async fn submitting_over_a_running_run_is_rejected() {
        let client = client();
        let mut session = client.session();
        session.submit().expect("first submit");
        let err = client
            .run(&mut session, &StoryRequest::new("robots", 2), &mut ())
            .await
            .expect_err("busy");

        assert!(matches!(err, ClientError::RunInProgress(_)));
        assert_eq!(session.state().status, RunStatus::Running);
    }

    #[tokio::test]
    async fn unreachable_server_fails_the_run() {
        let client = client();
        let mut session = client.session();
        let status = client
            .run(&mut session, &StoryRequest::new("robots", 2), &mut ())
            .await
            .expect("run settles");

        assert_eq!(status, RunStatus::Failed);
        assert!(
            session
                .state()
                .failure
                .as_deref()
                .is_some_and(|reason| reason.starts_with("transport error: story request failed"))
        );
    }

    #[test]
    fn empty_server_url_is_a_config_error() {
        assert!(matches!(
            StoryClient::new(ClientConfig::new("  ")),
            Err(ClientError::Config(_))
        ));
    }
}
