use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Process-wide configuration, loaded once at startup and passed by
/// reference into every component that needs it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PresskeepConfig {
    pub storage: StorageSection,
    pub artifacts: ArtifactSection,
    pub capture: CaptureSection,
    pub browser: BrowserSection,
}

impl PresskeepConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.storage.base_dir).join(path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub base_dir: String,
    pub data_dir: String,
    pub logs_dir: String,
    pub snapshots_db: String,
}

/// Filenames written inside each attempt folder.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactSection {
    pub source_filename: String,
    pub screenshot_filename: String,
    pub archive_filename: String,
    pub metadata_filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSection {
    /// chrono format string used for attempt folder names and the
    /// `scrape_time` metadata field.
    pub time_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub navigation_timeout_seconds: Option<u64>,
}

fn read_config<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

pub fn load_presskeep_config<P: AsRef<Path>>(path: P) -> ConfigResult<PresskeepConfig> {
    read_config(path.as_ref())
}

#[cfg(test)]
pub(crate) fn test_config(root: &Path) -> PresskeepConfig {
    PresskeepConfig {
        storage: StorageSection {
            base_dir: root.to_string_lossy().into_owned(),
            data_dir: "data".into(),
            logs_dir: "logs".into(),
            snapshots_db: "data/snapshots.sqlite".into(),
        },
        artifacts: ArtifactSection {
            source_filename: "source.html".into(),
            screenshot_filename: "screenshot.png".into(),
            archive_filename: "archive.mhtml".into(),
            metadata_filename: "metadata.json".into(),
        },
        capture: CaptureSection {
            time_format: "%Y-%m-%d_%H-%M-%S%.3f".into(),
        },
        browser: BrowserSection {
            executable_path: None,
            headless: true,
            sandbox: true,
            window_width: 1280,
            window_height: 800,
            navigation_timeout_seconds: Some(30),
        },
    }
}
