//! Disk Cache - command line access to a cache directory
//!
//! Opens the store, runs one operation and closes it again.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Duration;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diskcache::{DiskStore, StoreConfig};

/// Inspect and modify a disk cache directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache base directory (entries live under <path>/data)
    #[arg(long, env = "DISKCACHE_PATH", default_value = "./cache")]
    path: PathBuf,

    /// Capacity bound in bytes
    #[arg(long, env = "DISKCACHE_MAX_SIZE", default_value_t = 1024 * 1024 * 1024)]
    max_size: u64,

    /// Namespace prefix hashed in front of every key
    #[arg(long, default_value = "")]
    prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a value to stdout; exits with status 1 on a miss
    Get { key: String },
    /// Store a value
    Set {
        key: String,
        value: String,
        /// Seconds to live; 0 keeps it for ten years, negative stores it expired
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        ttl: i64,
    },
    /// Delete a value
    Remove { key: String },
    /// Print store statistics as JSON
    Stats,
}

/// Main entry point for the disk cache CLI.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging (stderr)
/// 2. Load configuration from environment variables and flags
/// 3. Open the store (directory scan, eviction task)
/// 4. Run the requested operation
/// 5. Close the store
#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diskcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = StoreConfig::from_env();
    config.base_path = args.path.clone();
    config.max_size_bytes = args.max_size;
    debug!(?config, "Configuration loaded");

    let store = DiskStore::open_with_config(config)
        .await
        .with_context(|| format!("failed to open cache at {}", args.path.display()))?;
    let cache = store.cache(args.prefix.as_bytes());

    let code = match args.command {
        Command::Get { key } => match cache.get(key.as_bytes()).await {
            Some(value) => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&value)?;
                stdout.flush()?;
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Command::Set { key, value, ttl } => {
            let lifetime = Duration::try_seconds(ttl)
                .with_context(|| format!("ttl of {} seconds is out of range", ttl))?;
            cache.set(key.as_bytes(), value.as_bytes(), lifetime).await;
            info!(key = %key, ttl, "Stored value");
            ExitCode::SUCCESS
        }
        Command::Remove { key } => {
            let removed = store.remove(&cache.store().content_key(key.as_bytes())).await;
            info!(key = %key, removed, "Remove complete");
            ExitCode::SUCCESS
        }
        Command::Stats => {
            let stats = store.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            ExitCode::SUCCESS
        }
    };

    store.close().await;
    Ok(code)
}
