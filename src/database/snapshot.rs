// Snapshot row recording what the last completed indexing run covered

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::IndexDatabase;
use crate::errors::Result;

/// What the last completed indexing run saw: when it ran, which files it
/// covered, and any per-file errors it absorbed along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub last_indexed: DateTime<Utc>,
    pub files: Vec<String>,
    pub elements_count: usize,
    pub errors: Vec<String>,
}

impl IndexSnapshot {
    /// Snapshot stamped with the current time
    pub fn new(files: Vec<String>, elements_count: usize, errors: Vec<String>) -> Self {
        Self {
            last_indexed: Utc::now(),
            files,
            elements_count,
            errors,
        }
    }
}

impl IndexDatabase {
    /// Write the snapshot row inside an open transaction. The table holds a
    /// single row so each run replaces the previous one wholesale.
    pub(super) fn write_snapshot(conn: &Connection, snapshot: &IndexSnapshot) -> Result<()> {
        let files_json = serde_json::to_string(&snapshot.files)?;
        let errors_json = serde_json::to_string(&snapshot.errors)?;

        conn.execute(
            "INSERT OR REPLACE INTO snapshot
             (id, last_indexed, files_json, elements_count, errors_json)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                snapshot.last_indexed.timestamp(),
                files_json,
                snapshot.elements_count as i64,
                errors_json
            ],
        )?;
        Ok(())
    }

    /// Load the snapshot from the last indexing run, if one ever completed
    pub fn load_snapshot(&self) -> Result<Option<IndexSnapshot>> {
        let result = self.conn.query_row(
            "SELECT last_indexed, files_json, elements_count, errors_json
             FROM snapshot WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );

        match result {
            Ok((last_indexed, files_json, elements_count, errors_json)) => {
                let files: Vec<String> = serde_json::from_str(&files_json)?;
                let errors: Vec<String> = serde_json::from_str(&errors_json)?;
                Ok(Some(IndexSnapshot {
                    last_indexed: DateTime::from_timestamp(last_indexed, 0).unwrap_or_default(),
                    files,
                    elements_count: elements_count as usize,
                    errors,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
