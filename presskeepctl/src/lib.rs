use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use presskeep_core::{
    build_report, known_target_urls, load_presskeep_config, write_csv, BatchStats, BrowserError,
    CaptureOptions, CaptureRunner, ChromeBrowser, ConfigError, PresskeepConfig, ReportError,
    SqliteSnapshotStore, StoreError,
};

pub mod commands;

use commands::{CaptureArgs, ReportArgs};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("nothing to capture: no urls given and --defaults not set")]
    EmptyBatch,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Presskeep news-page snapshot tool", long_about = None)]
pub struct Cli {
    /// Path to the presskeep.toml configuration
    #[arg(long, default_value = "configs/presskeep.toml")]
    pub config: PathBuf,
    /// Output format for command summaries
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture snapshots of one or more targets
    Capture(CaptureArgs),
    /// Build a CSV report over the capture history
    Report(ReportArgs),
}

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();
    let config = load_presskeep_config(&cli.config)?;
    match &cli.command {
        Commands::Capture(args) => run_capture(&config, args, cli.format),
        Commands::Report(args) => run_report(&config, args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn run_capture(config: &PresskeepConfig, args: &CaptureArgs, format: OutputFormat) -> Result<()> {
    let mut urls = args.urls.clone();
    if args.defaults {
        urls.extend(known_target_urls());
    }
    if urls.is_empty() {
        return Err(AppError::EmptyBatch);
    }

    let store = open_store(config, false)?;
    store.initialize()?;

    let options = CaptureOptions {
        save_source: !args.no_source,
        take_screenshot: args.screenshot,
        save_archive: args.archive,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let stats = runtime.block_on(capture_batch(config, &store, options, &urls))?;
    render_stats(&stats, format)
}

async fn capture_batch(
    config: &PresskeepConfig,
    store: &SqliteSnapshotStore,
    options: CaptureOptions,
    urls: &[String],
) -> Result<BatchStats> {
    let browser = ChromeBrowser::launch(&config.browser).await?;
    let runner = CaptureRunner::new(config, store, options);

    let batch = async {
        let mut session = browser.new_session().await?;
        Ok::<BatchStats, AppError>(runner.run(&mut session, urls).await)
    }
    .await;

    // The browser is released no matter how the batch went.
    if let Err(err) = browser.shutdown().await {
        warn!(error = %err, "browser shutdown reported an error");
    }
    batch
}

fn render_stats(stats: &BatchStats, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stats)?),
        OutputFormat::Text => {
            println!(
                "captured {}/{} targets ({} failed)",
                stats.captured, stats.targets, stats.failed
            );
            for error in &stats.errors {
                println!("  {error}");
            }
        }
    }
    Ok(())
}

fn run_report(config: &PresskeepConfig, args: &ReportArgs) -> Result<()> {
    let store = open_store(config, true)?;
    let rows = build_report(&store)?;

    let path = match &args.output {
        Some(path) => path.clone(),
        None => default_report_path(config),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(&path)?;
    write_csv(&rows, file)?;
    println!("wrote {} report rows to {}", rows.len(), path.display());
    Ok(())
}

fn default_report_path(config: &PresskeepConfig) -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d");
    config
        .resolve_path(&config.storage.logs_dir)
        .join("reports")
        .join(format!("{date}.csv"))
}

fn open_store(config: &PresskeepConfig, read_only: bool) -> Result<SqliteSnapshotStore> {
    let path = config.resolve_path(&config.storage.snapshots_db);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let store = SqliteSnapshotStore::builder()
        .path(path)
        .read_only(read_only)
        .create_if_missing(!read_only)
        .build()?;
    Ok(store)
}
