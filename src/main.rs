//! gold-runner - executes gold-standard SQL for text-to-SQL benchmark questions.

use gold_runner::cli::{Cli, Command};
use gold_runner::error::{GoldError, Result};
use gold_runner::{logging, run};
use std::path::Path;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run_cli().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<()> {
    let cli = Cli::parse_args();

    load_env_file(cli.env_file.as_deref())?;

    match cli.command {
        Command::Execute(args) => {
            let settings = args.resolve()?;
            info!(
                "Catalog: {}, output: {}",
                settings.questions.display(),
                settings.output.display()
            );
            run::execute_gold_queries(&settings).await?;
        }
        Command::Combine(args) => {
            run::combine_catalog(&args.input_dir, &args.output)?;
        }
    }

    Ok(())
}

/// Loads an explicit env file, or `./.env` when present.
fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                GoldError::config(format!("Failed to load env file {}: {e}", path.display()))
            })?;
            debug!("Loaded environment from {}", path.display());
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                debug!("Loaded environment from {}", path.display());
            }
        }
    }
    Ok(())
}
