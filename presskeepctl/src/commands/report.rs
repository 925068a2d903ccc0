use std::path::PathBuf;

use clap::Args;

/// Aggregates the capture history into a CSV report. No scraping is done.
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Output CSV path (defaults to <logs_dir>/reports/<date>.csv)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}
