use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::capture::{SnapshotMetadata, Stage};
use crate::store::{SqliteSnapshotStore, StoreError};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Aggregated capture history for one queried URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub queried_url: String,
    pub attempts: u64,
    pub with_source: u64,
    pub with_screenshot: u64,
    pub with_archive: u64,
    pub failed: u64,
    pub page_load_failures: u64,
    pub source_failures: u64,
    pub screenshot_failures: u64,
    pub archive_failures: u64,
    pub success_ratio: f64,
}

#[derive(Debug, Default)]
struct Accumulator {
    attempts: u64,
    with_source: u64,
    with_screenshot: u64,
    with_archive: u64,
    failed: u64,
    page_load_failures: u64,
    source_failures: u64,
    screenshot_failures: u64,
    archive_failures: u64,
}

impl Accumulator {
    fn absorb(&mut self, metadata: &SnapshotMetadata) {
        self.attempts += 1;
        if metadata.source.saved {
            self.with_source += 1;
        }
        if metadata.screenshot.saved {
            self.with_screenshot += 1;
        }
        if metadata.mhtml_archive.saved {
            self.with_archive += 1;
        }
        if metadata.failed() {
            self.failed += 1;
        }
        if metadata.stage_failed(Stage::PageLoad) {
            self.page_load_failures += 1;
        }
        if metadata.stage_failed(Stage::SaveSource) {
            self.source_failures += 1;
        }
        if metadata.stage_failed(Stage::TakeScreenshot) {
            self.screenshot_failures += 1;
        }
        if metadata.stage_failed(Stage::SaveMhtmlArchive) {
            self.archive_failures += 1;
        }
    }

    fn into_row(self, queried_url: String) -> ReportRow {
        let success_ratio = 1.0 - self.failed as f64 / self.attempts as f64;
        ReportRow {
            queried_url,
            attempts: self.attempts,
            with_source: self.with_source,
            with_screenshot: self.with_screenshot,
            with_archive: self.with_archive,
            failed: self.failed,
            page_load_failures: self.page_load_failures,
            source_failures: self.source_failures,
            screenshot_failures: self.screenshot_failures,
            archive_failures: self.archive_failures,
            success_ratio,
        }
    }
}

/// One row per distinct queried URL, sorted by URL for reproducible output.
///
/// A stored record whose metadata document no longer parses is skipped with
/// a warning; it never aborts the report.
pub fn build_report(store: &SqliteSnapshotStore) -> ReportResult<Vec<ReportRow>> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for stored in store.fetch_all()? {
        let metadata: SnapshotMetadata = match serde_json::from_str(&stored.metadata) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(id = stored.id, error = %err, "skipping malformed snapshot record");
                continue;
            }
        };
        groups
            .entry(metadata.queried_url.clone())
            .or_default()
            .absorb(&metadata);
    }
    Ok(groups
        .into_iter()
        .map(|(url, accumulator)| accumulator.into_row(url))
        .collect())
}

/// Writes the report rows as CSV, header included.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> ReportResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
