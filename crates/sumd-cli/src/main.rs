mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod ui;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use crate::ui::UiManager;
use clap::Parser;
use sumd::engine::state::RunStatus;
use tokio::task;
use tracing::{debug, error, info, warn};

const EXIT_ERROR: i32 = 1;

/// Maps the terminal state of a run to the process exit code.
fn exit_code(status: RunStatus) -> i32 {
    match status {
        RunStatus::Converged => 0,
        RunStatus::Exhausted => 2,
        RunStatus::Aborted => 3,
        RunStatus::Running => EXIT_ERROR,
    }
}

#[tokio::main]
async fn main() {
    match run_app().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(EXIT_ERROR);
        }
    }
}

async fn run_app() -> Result<i32> {
    let (ui_manager, ui_sender, shutdown_sender) = UiManager::new();
    let ui_handle = task::spawn(ui_manager.run());

    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, &cli.log_file, ui_sender.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    let command_result = async {
        info!("🚀 SuMD CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
        debug!("Full CLI arguments parsed: {:?}", &cli);

        match cli.command {
            Commands::Run(args) => {
                info!("Dispatching to 'run' command.");
                commands::run::run(args, ui_sender).await.map(exit_code)
            }
            Commands::Distance(args) => {
                info!("Dispatching to 'distance' command.");
                commands::distance::run(args).await.map(|_| 0)
            }
        }
    }
    .await;

    match &command_result {
        Ok(code) => info!("✅ Command completed with exit code {}.", code),
        Err(e) => error!("❌ Command failed: {}", e),
    }

    if shutdown_sender.send(true).is_err() {
        warn!("UI manager may have already exited before shutdown signal.");
    }

    ui_handle
        .await
        .map_err(|e| CliError::Other(anyhow::anyhow!("UI manager task failed: {}", e)))?;

    command_result
}
