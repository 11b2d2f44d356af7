//! unikv command-line interface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use unikv::KvStore;
use unikv::commands::{self, read, write};

#[derive(Parser, Debug)]
#[command(name = "unikv", version)]
#[command(about = "Uniform key-value access to redb, sled, DynamoDB and Redis")]
struct Cli {
    /// Store configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a value
    Set {
        bucket: String,
        key: String,
        value: String,
    },
    /// Store several KEY=VALUE pairs in one batch
    BatchSet {
        bucket: String,
        #[arg(required = true, value_parser = commands::parse_pair)]
        pairs: Vec<(String, String)>,
    },
    /// Print a value
    Get { bucket: String, key: String },
    /// Remove a key
    Delete { bucket: String, key: String },
    /// Drop a whole bucket
    DeleteBucket { bucket: String },
    /// Print every key and value of a bucket
    Scan { bucket: String },
    /// Delete items older than the configured TTL
    Reap { bucket: String },
    /// Show storage name and size
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = commands::load_config(cli.config.as_deref())?;
    let store = KvStore::open(&config)
        .await
        .with_context(|| format!("Failed to open {} store", config.backend.kind()))?;

    let result = run(&store, cli.command).await;
    let closed = store.close().await.context("Failed to close store");
    result?;
    closed
}

async fn run(store: &KvStore, command: Command) -> Result<()> {
    match command {
        Command::Set { bucket, key, value } => write::set(store, &bucket, &key, &value).await,
        Command::BatchSet { bucket, pairs } => write::batch_set(store, &bucket, &pairs).await,
        Command::Get { bucket, key } => read::get(store, &bucket, &key).await,
        Command::Delete { bucket, key } => write::delete(store, &bucket, &key).await,
        Command::DeleteBucket { bucket } => write::delete_bucket(store, &bucket).await,
        Command::Scan { bucket } => read::scan(store, &bucket).await,
        Command::Reap { bucket } => write::reap(store, &bucket).await,
        Command::Info => read::info(store).await,
    }
}

/// Initialize stderr logging; `RUST_LOG` overrides the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
