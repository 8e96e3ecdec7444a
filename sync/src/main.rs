//! Mirror CLI - inspect and replay snapshot reconciliation.
//!
//! `mirror diff` prints the change batch that turns one JSON array of items
//! into another. `mirror replay` streams snapshots through a real sync
//! session backed by the in-memory source and replica.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mirror_sync::{replay, Config};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mirror", version, about = "Snapshot reconciliation toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the change operations turning a replica into a snapshot
    Diff {
        /// JSON array holding the current replica items
        replica: PathBuf,
        /// JSON array holding the snapshot items
        snapshot: PathBuf,
        /// Field holding each item's key (defaults to MIRROR_KEY_FIELD)
        #[arg(long)]
        key_field: Option<String>,
    },
    /// Replay snapshots, one JSON array per line, through a sync session
    Replay {
        /// JSON-lines file of snapshots
        file: PathBuf,
        /// Namespace to sync (defaults to MIRROR_NAMESPACE)
        #[arg(long)]
        namespace: Option<String>,
        /// Field holding each item's key (defaults to MIRROR_KEY_FIELD)
        #[arg(long)]
        key_field: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mirror_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Diff {
            replica,
            snapshot,
            key_field,
        } => {
            let key_field = key_field.unwrap_or(config.key_field);
            run_diff(&replica, &snapshot, &key_field).await
        }
        Command::Replay {
            file,
            namespace,
            key_field,
        } => {
            let config = Config {
                namespace: namespace.unwrap_or(config.namespace),
                key_field: key_field.unwrap_or(config.key_field),
                ..config
            };
            run_replay(&file, &config).await
        }
    }
}

async fn read_items(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

async fn run_diff(
    replica: &Path,
    snapshot: &Path,
    key_field: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = replay::diff(read_items(replica).await?, read_items(snapshot).await?, key_field)?;
    tracing::info!(
        inserted = result.inserted,
        updated = result.updated,
        deleted = result.deleted,
        "Computed change batch"
    );

    println!("{}", serde_json::to_string_pretty(&result.ops)?);
    Ok(())
}

async fn run_replay(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(path).await?;
    let items = replay::replay(&text, config).await?;

    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}
