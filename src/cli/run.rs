use crate::config::types::Config;
use crate::config::{load_config, SYSTEM_CONFIG_PATH};
use crate::pipeline::{self, RunOutcome};
use crate::storage::ClickHouseClient;
use std::path::{Path, PathBuf};
use tracing::info;

/// Load the config or exit with a pointer to where it was looked for
pub fn require_config(config_path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/beacontail/config.yml");
            eprintln!("  {}", SYSTEM_CONFIG_PATH);
            eprintln!("\nUse --config <path> to specify a config file, or run 'beacontail config init' to generate one.");
            std::process::exit(1);
        }
    };

    load(&config_path)
}

fn load(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    info!(config_path = %config_path.display(), "Loading configuration");
    Ok(load_config(config_path)?)
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => info!(
            lines = summary.lines,
            rows = summary.rows,
            malformed = summary.malformed,
            "Done"
        ),
        RunOutcome::AlreadyRunning => info!("Pipeline already running elsewhere, nothing to do"),
    }
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = require_config(config_path)?;
    let client = ClickHouseClient::new(&config.clickhouse)?;

    let outcome = pipeline::run(&config, &client).await?;
    report(&outcome);
    Ok(())
}

pub fn skip(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = require_config(config_path)?;
    let outcome = pipeline::skip(&config)?;
    report(&outcome);
    Ok(())
}
