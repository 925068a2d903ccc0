use clap::Args;

/// Captures snapshots of the given targets through a shared browser session.
#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Target URLs or known-website short names
    pub urls: Vec<String>,

    /// Take a screenshot of each page
    #[arg(short = 's', long)]
    pub screenshot: bool,

    /// Save a full MHTML archive of each page
    #[arg(short = 'a', long)]
    pub archive: bool,

    /// Skip saving the raw page source
    #[arg(long)]
    pub no_source: bool,

    /// Append all known websites to the target list
    #[arg(long)]
    pub defaults: bool,
}
