use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "beacontail")]
#[command(about = "Beacon log tailer and ClickHouse loader", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ship the unread log backlog (default)
    Run,
    /// Move the checkpoint to the end of the log without shipping
    Skip,
    /// Deduplicate tables by copying them through FINAL and swapping
    Finalize {
        /// Tables to finalize; defaults to finalize.tables from the config
        tables: Vec<String>,
    },
    /// Run OPTIMIZE TABLE on each table
    Optimize {
        #[arg(required = true)]
        tables: Vec<String>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacontail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = beacontail::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            beacontail::cli::run::run(config_path).await?;
        }
        Some(Commands::Skip) => {
            beacontail::cli::run::skip(config_path)?;
        }
        Some(Commands::Finalize { tables }) => {
            beacontail::cli::maintenance::finalize_tables(config_path, tables).await?;
        }
        Some(Commands::Optimize { tables }) => {
            beacontail::cli::maintenance::optimize_tables(config_path, tables).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                beacontail::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                beacontail::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
