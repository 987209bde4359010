use rusqlite::Connection;
use std::path::Path;
use tokio::task;
use crate::error::{Result, WarmgraphError};

const PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536; \
     PRAGMA mmap_size = 268435456;";

/// Database connection wrapper
#[derive(Debug, Clone)]
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

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with optimized pragmas
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(WarmgraphError::Database)?;

        // WAL so the loader can read while an importer writes;
        // 64MB page cache and 256MB mmap for full-table scans on rebuild
        conn.execute_batch(PRAGMAS)?;

        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.open_connection()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| WarmgraphError::Internal(format!("database task failed: {}", e)))?
    }
}

pub mod migrate;
