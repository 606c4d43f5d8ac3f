use crate::cli::run::require_config;
use crate::storage::{finalize, ClickHouseClient, FinalizeOutcome};
use std::path::PathBuf;
use tracing::{error, info};

/// Finalize each table, continuing past failures; fails if any table did
pub async fn finalize_tables(
    config_path: Option<PathBuf>,
    tables: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = require_config(config_path)?;
    let tables = if tables.is_empty() {
        config.finalize.tables.clone()
    } else {
        tables
    };
    if tables.is_empty() {
        return Err("no tables given and finalize.tables is empty".into());
    }

    let client = ClickHouseClient::new(&config.clickhouse)?;
    let mut failed = 0usize;

    for table in &tables {
        match finalize(&client, table).await {
            Ok(FinalizeOutcome::Finalized { table, .. }) => info!(%table, "Finalized"),
            Ok(FinalizeOutcome::Skipped { table }) => info!(%table, "Skipped"),
            Err(e) => {
                failed += 1;
                error!(%table, error = %e, "Finalize failed");
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} tables failed to finalize", failed, tables.len()).into());
    }
    Ok(())
}

pub async fn optimize_tables(
    config_path: Option<PathBuf>,
    tables: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = require_config(config_path)?;
    let client = ClickHouseClient::new(&config.clickhouse)?;

    for table in &tables {
        client.optimize(table).await?;
    }
    Ok(())
}
