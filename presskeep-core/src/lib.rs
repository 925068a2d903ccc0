pub mod browser;
pub mod capture;
pub mod config;
pub mod consent;
pub mod report;
pub mod runner;
mod sqlite;
pub mod store;
pub mod target;

pub use browser::{BrowserError, BrowserResult, ChromeBrowser, ChromeSession, ElementHandle, PageSession};
pub use capture::{
    ArtifactRecord, CaptureAttempt, CaptureError, CaptureLog, CaptureResult, CaptureState,
    LogEvent, SnapshotMetadata, Stage,
};
pub use config::{load_presskeep_config, ConfigError, ConfigResult, PresskeepConfig};
pub use consent::{ConsentKind, ConsentStrategy};
pub use report::{build_report, write_csv, ReportError, ReportResult, ReportRow};
pub use runner::{BatchStats, CaptureOptions, CaptureRunner};
pub use store::{
    SqliteSnapshotStore, SqliteSnapshotStoreBuilder, StoreError, StoreResult, StoredSnapshot,
};
pub use target::{known_target_urls, resolve, TargetError, TargetIdentity, TargetResult};
