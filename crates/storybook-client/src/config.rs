use std::time::Duration;

use clap::Parser;
use storybook_core::{DEFAULT_STORIES_PATH, LogPolicy, MAX_PAGES, StoryRequest};

use crate::errors::ClientError;

/// Loads `.env` from the crate directory and the working directory.
pub fn load_env() {
    let _ = dotenvy::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    dotenvy::dotenv().ok();
}

/// Configuration for [`StoryClient`](crate::StoryClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the storybook server.
    pub server_url: String,
    /// Longest wait for the next chunk of the response stream.
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub log_policy: LogPolicy,
}

impl ClientConfig {
    /// Creates a config with default timeouts.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            read_timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            log_policy: LogPolicy::default(),
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn log_policy(mut self, policy: LogPolicy) -> Self {
        self.log_policy = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.server_url.trim().is_empty() {
            return Err(ClientError::Config("server url must not be empty".into()));
        }
        if self.read_timeout.is_zero() {
            return Err(ClientError::Config(
                "read timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn run_url(&self) -> String {
        format!("{}/api/run-script", self.server_url.trim_end_matches('/'))
    }
}

/// Command line arguments; connection options can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "storybook", about = "Generates a story and follows the run live")]
pub struct Args {
    /// Writing prompt.
    #[arg(long, short)]
    pub story: String,
    /// Number of pages.
    #[arg(long, short, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGES as i64))]
    pub pages: u32,
    /// Output directory for the engine.
    #[arg(long, env = "STORYBOOK_STORIES_PATH", default_value = DEFAULT_STORIES_PATH)]
    pub path: String,
    #[arg(long, env = "STORYBOOK_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    pub server_url: String,
    /// Seconds to wait for the next chunk before giving up on the run.
    #[arg(long, env = "STORYBOOK_READ_TIMEOUT_SECS", default_value_t = 120)]
    pub read_timeout_secs: u64,
    /// Keep tool start and progress events in the event log.
    #[arg(long)]
    pub retain_progress: bool,
}

impl Args {
    pub fn into_parts(self) -> (ClientConfig, StoryRequest) {
        let policy = if self.retain_progress {
            LogPolicy::RetainProgress
        } else {
            LogPolicy::ConsumeProgress
        };
        let config = ClientConfig::new(self.server_url)
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .log_policy(policy);
        let request = StoryRequest::new(self.story, self.pages).path(self.path);
        (config, request)
    }
}
