use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use graphwal::persistence::durability::{
    HealthMonitor, RecoveryPositionResolver, TransactionMetadataStore,
};
use graphwal::persistence::storage::{list_segments, StoreLayout};
use graphwal::util::WalConfig;
use log::warn;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_LOG_FILTER: &str = "info,graphwal=info";

/// Prints the position a store would resume its transaction log from.
#[derive(Parser, Debug, Clone)]
struct Cli {
    /// Store directory
    #[arg(long)]
    store: PathBuf,

    /// JSON WAL configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transaction id expected to be the last committed one
    #[arg(long, default_value_t = 1)]
    target_tx: u64,

    /// env_logger-style filter string (e.g. "info,graphwal=debug"); overrides RUST_LOG/defaults
    #[arg(long)]
    log_filter: Option<String>,
}

#[derive(Debug, Serialize)]
struct SegmentReport {
    version: u64,
    path: PathBuf,
    len: u64,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    store: PathBuf,
    logs_dir: PathBuf,
    transaction: graphwal::persistence::durability::TransactionId,
    position: graphwal::persistence::storage::LogPosition,
    segments: Vec<SegmentReport>,
}

fn init_logging(cli_filter: Option<&str>) {
    let env = Env::default().default_filter_or(DEFAULT_LOG_FILTER);
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(filter) = cli_filter {
        builder.parse_filters(filter);
    }
    builder.format_timestamp_secs();
    builder.format(|buf, record| {
        let ts = buf.timestamp();
        writeln!(
            buf,
            "[{} {:<5} {}] {}",
            ts,
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.target(env_logger::Target::Stderr);
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref());

    let config = match &cli.config {
        Some(path) => WalConfig::load(path)
            .with_context(|| format!("failed to load WAL config {}", path.display()))?,
        None => WalConfig::default(),
    }
    .with_env_overrides();
    config.validate().context("invalid WAL config")?;

    let layout = StoreLayout::new(&cli.store);
    let metadata_path = layout.metadata_file();
    let metadata = if metadata_path.exists() {
        TransactionMetadataStore::open_read_only(&metadata_path, HealthMonitor::new())
            .with_context(|| format!("failed to open {}", metadata_path.display()))?
    } else {
        warn!(
            "event=inspect_metadata_missing path={}",
            metadata_path.display()
        );
        TransactionMetadataStore::in_memory(HealthMonitor::new())
    };

    let resolver = RecoveryPositionResolver::new(&metadata, &layout, &config);
    let point = resolver
        .resolve(cli.target_tx)
        .context("failed to resolve recovery position")?;
    let logs_dir = resolver.logs_dir();
    let segments = list_segments(&logs_dir)
        .with_context(|| format!("failed to list {}", logs_dir.display()))?
        .into_iter()
        .map(|segment| SegmentReport {
            version: segment.version,
            path: segment.path,
            len: segment.len,
        })
        .collect();

    let report = InspectReport {
        store: layout.root().to_path_buf(),
        logs_dir,
        transaction: point.transaction,
        position: point.position,
        segments,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &report).context("failed to write report")?;
    writeln!(out)?;
    Ok(())
}
