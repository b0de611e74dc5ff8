//! HTTP side of the storybook stream.
//!
//! `POST /api/run-script` starts one engine run per request and streams its
//! frames back as event-stream records until the run's terminal record.

/// Server configuration from arguments and environment.
pub mod config;
/// Tool engine contract and the process-backed engine.
pub mod engine;
/// Per-run task that turns engine frames into records.
pub mod pump;
/// HTTP routes.
pub mod routes;

pub use config::{Args, ConfigError, ServerConfig};
pub use engine::{EngineError, EngineRun, FrameStream, ProcessEngine, RunOpts, ToolEngine};
pub use pump::{RecordStream, spawn_run};
pub use routes::{AppState, router};
