//! Kuba Window Cache command line
//!
//! Runs aggregation requests against points loaded from a JSON file, through
//! one dispatcher and one cache, so repeated runs show cache reuse.
//!
//! # Usage
//!
//! ```bash
//! # Run a request twice; the second run is answered from the cache
//! kuba-window-cache query --points points.json \
//!     --request '{"request": "sum(sample)", "start": 0, "stop": 19, "step": 10}' \
//!     --repeat 2
//!
//! # Validate a configuration file
//! kuba-window-cache --config cache.toml check-config
//! ```
//!
//! # Environment Variables
//!
//! - `TSDB_CACHE_ENABLED`: Enable or disable the cache
//! - `TSDB_CACHE_TTL_SECS`: Cache entry lifetime
//! - `TSDB_MAX_PARALLEL_WORKERS`: Workers running at once per request
//! - `TSDB_REQUEST_TIMEOUT_MS`: Worker execution deadline
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use kuba_window_cache::cache::InMemoryCacheStore;
use kuba_window_cache::config::Config;
use kuba_window_cache::query::{DispatcherConfig, QueryRequest, RequestDispatcher};
use kuba_window_cache::storage::InMemoryPointStore;
use kuba_window_cache::types::DataPoint;

#[derive(Parser)]
#[command(name = "kuba-window-cache")]
#[command(version)]
#[command(about = "Time-windowed aggregation cache for time-series queries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an aggregation request against points from a JSON file
    Query {
        /// JSON array of points: {"metric", "timestamp" | "date", "value", "tags"}
        #[arg(short, long)]
        points: PathBuf,

        /// Request as JSON: {"request", "start", "stop", "step", "tags"}
        #[arg(short, long)]
        request: String,

        /// Number of times to run the request
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },

    /// Validate configuration file and print a summary
    CheckConfig,
}

fn load_config(path: Option<&Path>) -> kuba_window_cache::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file_with_env(path)?,
        None => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.monitoring.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(config: &Config) {
    println!("Configuration is valid!");
    println!();
    println!("Cache Settings:");
    println!("  Enabled: {}", config.cache.enabled);
    println!("  TTL: {}s", config.cache.ttl_secs);
    println!("  Step divisors: {:?}", config.cache.step_divisors);
    println!("  Max entries: {}", config.cache.max_entries);
    println!();
    println!("Execution:");
    println!(
        "  Max parallel workers: {}",
        config.execution.max_parallel_workers
    );
    match config.execution.request_timeout() {
        Some(timeout) => println!("  Request timeout: {:?}", timeout),
        None => println!("  Request timeout: none"),
    }
    println!("  Max windows: {}", config.execution.max_windows);
    println!();
    println!("Monitoring:");
    println!("  Log level: {}", config.monitoring.log_level);
}

/// Load points, run the request `repeat` times and print each result
async fn cmd_query(
    config: &Config,
    points_path: &Path,
    request: &str,
    repeat: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(points_path)?;
    let points: Vec<DataPoint> = serde_json::from_str(&contents)?;
    let request: QueryRequest = serde_json::from_str(request)?;

    let backend = Arc::new(InMemoryPointStore::new());
    backend.insert_many(points);

    let cache = Arc::new(InMemoryCacheStore::from_config(&config.cache));
    let dispatcher = RequestDispatcher::with_config(
        backend.clone(),
        cache,
        DispatcherConfig::from_config(config),
    );
    debug!(?dispatcher, "Dispatcher ready");

    for run in 1..=repeat.max(1) {
        let before = backend.queries_executed();
        let rows = dispatcher.request(&request).await?;
        info!(
            run,
            rows = rows.len(),
            backend_queries = backend.queries_executed() - before,
            "Request complete"
        );
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    let stats = dispatcher.stats();
    info!(?stats, "Dispatcher statistics");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config);

    match &cli.command {
        Commands::CheckConfig => cmd_check_config(&config),
        Commands::Query {
            points,
            request,
            repeat,
        } => cmd_query(&config, points, request, *repeat).await?,
    }

    Ok(())
}
