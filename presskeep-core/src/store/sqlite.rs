use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags};

use crate::capture::SnapshotMetadata;
use crate::sqlite::configure_connection;

use super::error::{StoreError, StoreResult};

const SNAPSHOT_SCHEMA: &str = include_str!("../../../sql/snapshots.sql");

#[derive(Debug, Clone)]
pub struct SqliteSnapshotStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteSnapshotStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteSnapshotStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn build(self) -> StoreResult<SqliteSnapshotStore> {
        let path = self.path.ok_or(StoreError::MissingPath)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Ok(SqliteSnapshotStore { path, flags })
    }
}

/// Append-only history of capture attempts, one row per finalized record.
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    path: PathBuf,
    flags: OpenFlags,
}

/// One stored row, raw metadata document included.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub id: i64,
    pub queried_url: String,
    pub failed: bool,
    pub metadata: String,
}

impl SqliteSnapshotStore {
    pub fn builder() -> SqliteSnapshotStoreBuilder {
        SqliteSnapshotStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        SqliteSnapshotStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> StoreResult<Connection> {
        let conn =
            Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
                StoreError::OpenDatabase {
                    path: self.path.clone(),
                    source,
                }
            })?;
        configure_connection(&conn).map_err(|source| StoreError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(SNAPSHOT_SCHEMA)?;
        Ok(())
    }

    /// Appends one snapshot record; returns its row id.
    ///
    /// The artifact path columns are derived from the metadata: set only for
    /// artifacts that were actually saved.
    pub fn insert_snapshot(&self, metadata: &SnapshotMetadata) -> StoreResult<i64> {
        let document = serde_json::to_string(metadata)?;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO snapshots (
                website_name, queried_url, scraped_url,
                path_to_source, path_to_screenshot, path_to_archive,
                snapshot_date, failed, metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                metadata.name,
                metadata.queried_url,
                metadata.scraped_url,
                metadata.source_path(),
                metadata.screenshot_path(),
                metadata.archive_path(),
                metadata.scrape_time,
                metadata.failed(),
                document,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every stored row, oldest first.
    pub fn fetch_all(&self) -> StoreResult<Vec<StoredSnapshot>> {
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT id, queried_url, failed, metadata FROM snapshots ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredSnapshot {
                id: row.get(0)?,
                queried_url: row.get(1)?,
                failed: row.get(2)?,
                metadata: row.get(3)?,
            })
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }
}
