//! dbscope - Main entry point.

use clap::Parser;
use dbscope::cli::{self, Cli};
use dbscope::config::load_env_file;
use dbscope::logging::init_tracing;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Env file values feed the clap `env` fallbacks, so load them first
    let env_file = match load_env_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Parse configuration from command line and environment
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.config) {
        eprintln!("Error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    if let Some(path) = &env_file {
        debug!(path = %path.display(), "Loaded env file");
    }

    info!(
        app_name = %cli.config.app_name,
        app_env = %cli.config.app_env,
        "Starting command line interface v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut input = io::stdin().lock();
    let mut out = io::stdout();
    match cli::run(cli, &mut input, &mut out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}
