//! Proxy Cache - maintenance tool
//!
//! Inspects and invalidates the cache described by the `CACHE_*` environment
//! variables, the same way the proxy admin surface does.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proxy_cache::{new_storage, Storage, StorageConfig};

#[derive(Debug, Parser)]
#[command(name = "proxy-cache", version, about = "Inspect and invalidate the proxy response cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print usage statistics as JSON
    Stats,
    /// Show the status, headers and size of a cached response
    Get {
        /// Cache key, e.g. "example.com:GET:/index.html"
        key: String,
    },
    /// Remove one cached response
    Delete { key: String },
    /// Remove every cached response
    Clear,
}

/// Entry point for the maintenance tool.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the configured storage backend
/// 4. Run the requested command
/// 5. Stop the backend so the on-disk index is flushed
fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxy_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = StorageConfig::from_env();
    info!(
        "Configuration loaded: storage_type={}, cache_dir={}, max_size={}, default_ttl={}s",
        config.storage_type,
        config.cache_dir.display(),
        config.max_size,
        config.default_ttl
    );

    ensure_file_backend(&config)?;
    let storage = new_storage(&config).context("failed to initialize cache")?;
    let outcome = run(storage.as_ref(), cli.command);
    storage.stop();
    outcome
}

/// The memory backend lives inside the proxy process, so a separate tool
/// would only ever see its own empty cache.
fn ensure_file_backend(config: &StorageConfig) -> Result<()> {
    if matches!(config.storage_type.as_str(), "memory" | "") {
        anyhow::bail!("the maintenance tool needs the file backend (set CACHE_STORAGE_TYPE=file)");
    }
    Ok(())
}

fn run(storage: &dyn Storage, command: Command) -> Result<()> {
    match command {
        Command::Stats => {
            let stats = serde_json::to_string_pretty(&storage.stats())?;
            println!("{}", stats);
        }
        Command::Get { key } => match storage.fetch_item(&key) {
            Some(entry) => {
                println!("status: {}", entry.status_code);
                let mut headers: Vec<_> = entry.headers.iter().collect();
                headers.sort();
                for (name, value) in headers {
                    println!("{}: {}", name, value);
                }
                println!("size: {} bytes", entry.size);
                match entry.expires_at {
                    Some(expires) => println!("expires: {}", expires.to_rfc3339()),
                    None => println!("expires: never"),
                }
            }
            None => anyhow::bail!("no cached response for {}", key),
        },
        Command::Delete { key } => {
            storage.delete(&key);
            info!("Deleted {}", key);
        }
        Command::Clear => {
            storage.clear();
            info!("Cache cleared");
        }
    }
    Ok(())
}
