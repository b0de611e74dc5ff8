use std::process::ExitCode;

use clap::Parser as _;
use storybook_client::{Args, StoryClient, TerminalPrinter, load_env};
use storybook_core::RunStatus;
use storybook_core::observability::init_observability;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    load_env();
    init_observability("warn");

    let (config, request) = Args::parse().into_parts();
    let client = StoryClient::new(config)?;
    let mut session = client.session();
    let mut printer = TerminalPrinter::new(std::io::stdout());

    let status = client.run(&mut session, &request, &mut printer).await?;
    Ok(match status {
        RunStatus::Finished => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
