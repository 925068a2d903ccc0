use std::path::Path;

use serde::{Deserialize, Serialize};

use super::log::{LogEvent, Stage};

/// Whether one artifact was captured, and under which filename.
///
/// `saved` implies a filename; an unsaved record never carries a stale one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub saved: bool,
    pub filename: Option<String>,
}

impl ArtifactRecord {
    pub fn missing() -> Self {
        Self {
            saved: false,
            filename: None,
        }
    }

    pub fn present(filename: impl Into<String>) -> Self {
        Self {
            saved: true,
            filename: Some(filename.into()),
        }
    }
}

/// Finalized description of one capture attempt: the unit of persistence and
/// the unit the report aggregator consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub name: String,
    pub queried_url: String,
    pub scraped_url: Option<String>,
    pub scrape_time: String,
    pub logs: Vec<LogEvent>,
    pub folder_path: String,
    pub source: ArtifactRecord,
    pub screenshot: ArtifactRecord,
    pub mhtml_archive: ArtifactRecord,
}

impl SnapshotMetadata {
    /// True iff the log carries at least one exception-marked entry.
    pub fn failed(&self) -> bool {
        self.logs.iter().any(|event| event.exception)
    }

    pub fn stage_failed(&self, stage: Stage) -> bool {
        self.logs
            .iter()
            .any(|event| event.exception && event.stage == Some(stage))
    }

    pub fn source_path(&self) -> Option<String> {
        artifact_path(&self.folder_path, &self.source)
    }

    pub fn screenshot_path(&self) -> Option<String> {
        artifact_path(&self.folder_path, &self.screenshot)
    }

    pub fn archive_path(&self) -> Option<String> {
        artifact_path(&self.folder_path, &self.mhtml_archive)
    }
}

fn artifact_path(folder: &str, record: &ArtifactRecord) -> Option<String> {
    if !record.saved {
        return None;
    }
    record
        .filename
        .as_ref()
        .map(|name| Path::new(folder).join(name).to_string_lossy().into_owned())
}
