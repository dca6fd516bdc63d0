use rusqlite::Connection;
use std::path::Path;
use tokio::task;

use crate::error::{Result, WikigraphError};

pub mod migrate;

/// Database connection wrapper
///
/// Opens a fresh connection per call and runs the closure on a blocking
/// task so SQLite work never stalls the async runtime.
pub struct Db {
    path: std::path::PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Connection::open(&path).map_err(WikigraphError::Database)?;

            // WAL for concurrent readers, NORMAL sync for speed, foreign
            // keys for integrity.
            conn.execute_batch(
                "PRAGMA journal_mode = WAL; \
                 PRAGMA synchronous = NORMAL; \
                 PRAGMA foreign_keys = ON; \
                 PRAGMA temp_store = MEMORY;",
            )?;

            f(&mut conn)
        })
        .await
        .map_err(|e| WikigraphError::Task(e.to_string()))?
    }
}
