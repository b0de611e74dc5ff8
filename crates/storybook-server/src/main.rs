use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;
use storybook_core::observability::init_observability;
use storybook_server::{AppState, Args, ProcessEngine, ServerConfig, router};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storybook_server::config::load_env();
    init_observability("info");

    let config = ServerConfig::from_args(Args::parse())?;
    let engine =
        Arc::new(ProcessEngine::new(&config.engine_bin).with_args(config.engine_args.clone()));
    let app = router(AppState::new(engine, &config));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(
        addr = %config.addr,
        script = %config.script,
        engine = %config.engine_bin,
        "storybook server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;
    info!("storybook server stopped");
    Ok(())
}
