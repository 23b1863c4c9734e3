//! WolfMirror - Redis Source/Destination Mirroring
//!
//! Command-line front end: bulk migration, live replication, watch mode
//! and divergence checks between two Redis endpoints.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfmirror::config::MirrorConfig;
use wolfmirror::error::{Error, Result};
use wolfmirror::mirror::{self, Endpoint, Mirror};
use wolfmirror::replicator::Watcher;
use wolfmirror::seed::DEFAULT_SEED_COUNT;
use wolfmirror::store::printable;

/// WolfMirror - Redis Source/Destination Mirroring
#[derive(Parser)]
#[command(name = "wolfmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfmirror.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides logging.level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Also write logs to this file; overrides logging.file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every source key with its TTL to the destination
    Migrate,

    /// Replicate source writes to the destination as they happen
    Sync,

    /// Print decoded source commands without writing anything
    Watch {
        /// Include inline values; overrides logging.verbose
        #[arg(long)]
        verbose: bool,
    },

    /// Check whether both endpoints hold the same keys and values
    Check,

    /// Show key/value pairs present on only one side
    Diff,

    /// Compare key sets of both endpoints
    Status,

    /// List the keys of one endpoint
    Keys {
        #[arg(short, long, value_enum, default_value = "src")]
        endpoint: Endpoint,
    },

    /// List the remaining TTL of every key of one endpoint
    Ttls {
        #[arg(short, long, value_enum, default_value = "src")]
        endpoint: Endpoint,
    },

    /// Delete every non-ignored key of one endpoint
    Purge {
        #[arg(short, long, value_enum)]
        endpoint: Endpoint,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Write random expiring keys to the source
    Seed {
        #[arg(short = 'n', long, default_value_t = DEFAULT_SEED_COUNT)]
        count: usize,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfmirror.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // These two work without a loadable configuration
    match &cli.command {
        Commands::Init { output } => return run_init(output),
        Commands::Validate => return run_validate(&cli.config),
        _ => {}
    }

    let config = match MirrorConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", cli.config, e);
            return Err(e);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_file = cli.log_file.as_deref().or(config.logging.file.as_deref());
    // Flushes the file sink on drop, so it lives until main returns
    let _guard = init_logging(level, log_file)?;
    let color = config.logging.color && log_file.is_none();

    match cli.command {
        Commands::Migrate => run_migrate(&config).await,
        Commands::Sync => run_sync(&config).await,
        Commands::Watch { verbose } => run_watch(&config, verbose || config.logging.verbose).await,
        Commands::Check => run_check(&config).await,
        Commands::Diff => run_diff(&config).await,
        Commands::Status => run_status(&config, color).await,
        Commands::Keys { endpoint } => run_keys(&config, endpoint).await,
        Commands::Ttls { endpoint } => run_ttls(&config, endpoint).await,
        Commands::Purge { endpoint, yes } => run_purge(&config, endpoint, yes).await,
        Commands::Seed { count } => run_seed(&config, count).await,
        Commands::Init { .. } | Commands::Validate => Ok(()),
    }
}

fn init_logging(level: &str, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string());

    let (file_layer, guard) = match file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(log_appender(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer.clone());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_timer(timer))
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Appends to exactly `path`; rotation is left to the host
fn log_appender(path: &Path) -> Result<RollingFileAppender> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("log file {:?} has no file name", path)))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok(RollingFileAppender::new(Rotation::NEVER, dir, name))
}

/// Bulk copy source to destination
async fn run_migrate(config: &MirrorConfig) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    let report = mirror.migrate().await?;

    println!(
        "Migrated {} keys from {} to {} ({} skipped, {} failed)",
        report.copied,
        config.src.address(),
        config.dst.address(),
        report.skipped,
        report.failed.len()
    );
    Ok(())
}

/// Live replication until the feed ends or Ctrl-C
async fn run_sync(config: &MirrorConfig) -> Result<()> {
    let (stream, mut replicator) = mirror::open_replication(config).await?;

    tokio::select! {
        result = replicator.run(stream) => {
            let summary = result?;
            println!(
                "Replication ended: {} lines, {} updates, {} deletes, {} skipped, {} failed",
                summary.lines, summary.updates, summary.deletes, summary.skipped, summary.failed
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }
    Ok(())
}

/// Log decoded source commands until the feed ends or Ctrl-C
async fn run_watch(config: &MirrorConfig, verbose: bool) -> Result<()> {
    let stream = mirror::open_watch(config).await?;
    let watcher = Watcher::new(verbose);

    tokio::select! {
        result = watcher.run(stream) => {
            let lines = result?;
            tracing::info!("Watch ended after {} lines", lines);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }
    Ok(())
}

async fn run_check(config: &MirrorConfig) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    if mirror.equal().await? {
        println!("✓ Source and destination hold the same data");
    } else {
        println!("✗ Source and destination differ (run `wolfmirror diff` for details)");
    }
    Ok(())
}

async fn run_diff(config: &MirrorConfig) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    let divergence = mirror.diff().await?;

    for (key, value) in &divergence.src_only {
        println!("src => key: {}, value: {}", printable(key), printable(value));
    }
    for (key, value) in &divergence.dst_only {
        println!("dst => key: {}, value: {}", printable(key), printable(value));
    }
    if divergence.is_empty() {
        println!("No differences");
    }
    Ok(())
}

/// Status goes through the log so a configured log file records it
async fn run_status(config: &MirrorConfig, color: bool) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    let status = mirror.sync_status().await?;
    tracing::info!("{}", status.render(color));
    Ok(())
}

async fn run_keys(config: &MirrorConfig, endpoint: Endpoint) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    let keys = mirror.keys(endpoint).await?;
    for key in &keys {
        println!("{}", printable(key));
    }
    println!("{}:{}", endpoint, keys.len());
    Ok(())
}

async fn run_ttls(config: &MirrorConfig, endpoint: Endpoint) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    for (key, expiry) in mirror.ttls(endpoint).await? {
        println!("key: {}, ttl: {}", printable(&key), expiry);
    }
    Ok(())
}

async fn run_purge(config: &MirrorConfig, endpoint: Endpoint, yes: bool) -> Result<()> {
    if !yes {
        return Err(Error::Config(format!(
            "refusing to purge {} ({}) without --yes",
            endpoint,
            config.endpoint(endpoint).address()
        )));
    }

    let mut mirror = Mirror::connect(config).await?;
    let removed = mirror.purge(endpoint).await?;
    println!("Deleted {} keys from {}", removed, endpoint);
    Ok(())
}

async fn run_seed(config: &MirrorConfig, count: usize) -> Result<()> {
    let mut mirror = Mirror::connect(config).await?;
    let keys = mirror.seed(count).await?;
    println!("Wrote {} keys to {}", keys.len(), config.src.address());
    Ok(())
}

/// Initialize a new configuration file
fn run_init(output: &Path) -> Result<()> {
    let config_content = r#"# WolfMirror Configuration
# Generated configuration file

[src]
host = "127.0.0.1"
port = 6379
db = 0
# username = "mirror"
# password = "changeme"
connect_timeout_secs = 5
request_timeout_secs = 30

[dst]
host = "127.0.0.1"
port = 6380
db = 0
connect_timeout_secs = 5
request_timeout_secs = 30

[option]
ignore_key = []
# ignore_key = ["lock:global"]

[logging]
level = "info"
# file = "/var/log/wolfmirror.log"
verbose = false
color = true
"#;

    std::fs::write(output, config_content)?;
    println!("Configuration file created: {:?}", output);
    println!("Edit the file to point [src] and [dst] at your Redis servers.");
    Ok(())
}

/// Validate configuration file
fn run_validate(config_path: &Path) -> Result<()> {
    match MirrorConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Source:      {} (db {})", config.src.address(), config.src.db);
            println!("  Destination: {} (db {})", config.dst.address(), config.dst.db);
            println!("  Ignored keys: {}", config.option.ignore_key.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}
