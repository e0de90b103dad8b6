//! Vestige's Database Module - SQLite Source of Truth
//!
//! Everything the index knows lives in one SQLite file under `.vestige/index/`:
//! extracted code elements with their embedding vectors, per-file summaries,
//! and the snapshot row recording what the last indexing run covered.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::Result;

mod elements;
mod schema;
mod snapshot;

pub use snapshot::IndexSnapshot;

/// The index database connection and operations
pub struct IndexDatabase {
    pub(crate) conn: Connection,
    pub(crate) file_path: PathBuf,
}

impl IndexDatabase {
    /// Open (or create) the database and make sure the schema exists
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let file_path = db_path.as_ref().to_path_buf();

        info!("Opening index database at: {}", file_path.display());

        let conn = Connection::open(&file_path)?;

        // Wait up to 5 seconds for locks held by a concurrent process
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;

        // Keep the WAL from growing unbounded between checkpoints
        conn.pragma_update(None, "wal_autocheckpoint", 2000)?;

        let mut db = Self { conn, file_path };
        db.initialize_schema()?;

        info!("Index database ready");
        Ok(db)
    }

    /// Where this database lives on disk
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}
