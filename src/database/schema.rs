// Schema initialization and table creation

use super::IndexDatabase;
use crate::errors::Result;
use tracing::debug;

impl IndexDatabase {
    /// Initialize the complete database schema
    pub(super) fn initialize_schema(&mut self) -> Result<()> {
        debug!("Creating index database schema");

        self.create_code_elements_table()?;
        self.create_file_summaries_table()?;
        self.create_snapshot_table()?;

        debug!("Index database schema created successfully");
        Ok(())
    }

    /// Create the code_elements table holding one row per extracted element
    fn create_code_elements_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS code_elements (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file_path TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                doc_comment TEXT,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Indexes for the two lookup shapes the index layer uses
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_elements_file ON code_elements(file_path)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_elements_kind ON code_elements(kind)",
            [],
        )?;

        debug!("Created code_elements table and indexes");
        Ok(())
    }

    /// Create the file_summaries table, one row per indexed file
    fn create_file_summaries_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS file_summaries (
                file_path TEXT PRIMARY KEY,
                file_type TEXT NOT NULL,
                element_count INTEGER NOT NULL,
                summary TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_summaries_type ON file_summaries(file_type)",
            [],
        )?;

        debug!("Created file_summaries table and index");
        Ok(())
    }

    /// Create the single-row snapshot table describing the last indexing run
    fn create_snapshot_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_indexed INTEGER NOT NULL,
                files_json TEXT NOT NULL,
                elements_count INTEGER NOT NULL,
                errors_json TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Created snapshot table");
        Ok(())
    }
}
