use std::net::SocketAddr;

use clap::Parser;

pub const DEFAULT_SCRIPT: &str = "app/api/run-script/story-book.gpt";

/// Loads `.env` from the crate directory and the working directory.
pub fn load_env() {
    let _ = dotenvy::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/.env"));
    dotenvy::dotenv().ok();
}

/// Command line arguments; every option can also be set from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "storybook-server", about = "Streams story generation runs as events")]
pub struct Args {
    /// Address to listen on.
    #[arg(long, env = "STORYBOOK_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,
    /// Script handed to the engine for every run.
    #[arg(long, env = "STORYBOOK_SCRIPT", default_value = DEFAULT_SCRIPT)]
    pub script: String,
    /// Engine executable.
    #[arg(long, env = "STORYBOOK_ENGINE_BIN", default_value = "gptscript")]
    pub engine_bin: String,
    /// Extra whitespace-separated arguments passed to the engine before the run arguments.
    #[arg(long, env = "STORYBOOK_ENGINE_ARGS", default_value = "", allow_hyphen_values = true)]
    pub engine_args: String,
    /// Records buffered per run before the engine is back-pressured.
    #[arg(long, env = "STORYBOOK_STREAM_CAPACITY", default_value_t = 64)]
    pub stream_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Invalid(String),
}

/// Validated server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub script: String,
    pub engine_bin: String,
    pub engine_args: Vec<String>,
    pub stream_capacity: usize,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.script.trim().is_empty() {
            return Err(ConfigError::Invalid("script must not be empty".into()));
        }
        if args.engine_bin.trim().is_empty() {
            return Err(ConfigError::Invalid("engine binary must not be empty".into()));
        }
        if args.stream_capacity == 0 {
            return Err(ConfigError::Invalid(
                "stream capacity must be greater than 0".into(),
            ));
        }
        Ok(Self {
            addr: args.addr,
            script: args.script,
            engine_bin: args.engine_bin,
            engine_args: args
                .engine_args
                .split_whitespace()
                .map(ToOwned::to_owned)
                .collect(),
            stream_capacity: args.stream_capacity,
        })
    }
}
