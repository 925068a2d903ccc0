mod error;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteSnapshotStore, SqliteSnapshotStoreBuilder, StoredSnapshot};
