//! Shared SQLite database handle.
//!
//! All stores share one database file. Every operation opens its own
//! short-lived connection with WAL mode, foreign keys, and a busy
//! timeout; connections are never pooled or shared across operations.
//! Schema migrations run once when the handle is opened.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::StoreError;
use crate::migrate;

/// Handle to the backing SQLite file, shared by all stores.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Opens (or creates) the database at `path` and brings the schema
    /// up to date. Fails with `SCHEMA_MIGRATION_REQUIRED` or
    /// `STORAGE_CORRUPTED` if the stored shape cannot be migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database {
            path: path.as_ref().to_path_buf(),
        };
        if let Some(parent) = db.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    StoreError::fatal(
                        "STORAGE_ERROR",
                        format!("failed to create storage directory: {err}"),
                    )
                })?;
            }
        }
        let mut conn = db.connect()?;
        migrate::migrate(&mut conn)?;
        Ok(db)
    }

    /// Opens a fresh connection with the standard pragmas applied.
    pub(crate) fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
