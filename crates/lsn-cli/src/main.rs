mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 lsn v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if let Some(num_threads) = cli.threads {
        info!(
            "Setting Rayon global thread pool to {} threads.",
            num_threads
        );
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e))
            })?;
    }

    let project = cli.project.clone();
    let command_result = match cli.command {
        Commands::Ising(args) => {
            info!("Dispatching to 'ising' command.");
            commands::ising::run(args, project).await
        }
        Commands::Md(args) => {
            info!("Dispatching to 'md' command.");
            commands::md::run(args, project).await
        }
        Commands::Annealing(args) => {
            info!("Dispatching to 'annealing' command.");
            commands::annealing::run(args, project).await
        }
        Commands::Tsp(args) => {
            info!("Dispatching to 'tsp' command.");
            commands::tsp::run(args, project).await
        }
        Commands::Migration(args) => {
            info!("Dispatching to 'migration' command.");
            commands::migration::run(args, project).await
        }
        Commands::Stats(args) => {
            info!("Dispatching to 'stats' command.");
            commands::stats::run(args).await
        }
    };

    match &command_result {
        Ok(_) => {
            info!("✅ Command completed successfully.");
            println!("✅ Command completed successfully.");
        }
        Err(e) => {
            error!("❌ Command failed: {}", e);
            eprintln!("❌ Command failed: {}", e);
        }
    }

    command_result
}
