//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations.

use super::migrations;
use crate::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Set once the process has fallen back to in-memory storage.
static DEGRADED_LOGGED: AtomicBool = AtomicBool::new(false);

/// Local database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the same connection.
#[derive(Clone, Debug)]
pub struct LocalDb {
    pub(crate) conn: Connection,
    persistent: bool,
}

impl LocalDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .await
            .map_err(|e| Error::StorageUnavailable(format!("cannot open {}: {e}", path.display())))?;

        Self::init(conn, true).await
    }

    /// Open an in-memory database.
    ///
    /// Used by tests and as the fallback when the on-disk store is unusable.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;

        Self::init(conn, false).await
    }

    /// Open the on-disk database, degrading to in-memory storage for this
    /// session when persistence is unavailable.
    ///
    /// The degradation is logged once per process.
    pub async fn open_or_memory(path: impl AsRef<Path>) -> Result<Self, Error> {
        match Self::open(path.as_ref()).await {
            Ok(db) => Ok(db),
            Err(e) if e.is_storage_unavailable() => {
                if !DEGRADED_LOGGED.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        path = %path.as_ref().display(),
                        error = %e,
                        "local storage unavailable, continuing without persistence for this session"
                    );
                }
                Self::open_in_memory().await
            }
            Err(e) => Err(e),
        }
    }

    /// Whether writes survive a process restart.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    async fn init(conn: Connection, persistent: bool) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), Error> {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        migrations::run(&conn).await?;

        Ok(Self { conn, persistent })
    }
}
