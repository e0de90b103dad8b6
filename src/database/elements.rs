// Element and file-summary storage operations

use rusqlite::{params, Row};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{IndexDatabase, IndexSnapshot};
use crate::errors::{Result, VestigeError};
use crate::extractors::{matches_file_type, CodeElement, ElementKind, FileSummary};

/// Serialize an f32 vector to little-endian bytes for BLOB storage
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize BLOB bytes back to an f32 vector, validating the size
pub(crate) fn blob_to_vector(bytes: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    if bytes.len() != dimensions * 4 {
        return Err(VestigeError::DimensionMismatch {
            expected: dimensions * 4,
            actual: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn row_to_element(row: &Row) -> rusqlite::Result<CodeElement> {
    let kind: String = row.get(2)?;
    Ok(CodeElement {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: ElementKind::from_str_or_other(&kind),
        file_path: row.get(3)?,
        start_line: row.get(4)?,
        end_line: row.get(5)?,
        doc_comment: row.get(6)?,
        content: row.get(7)?,
        embedding: Vec::new(),
    })
}

impl IndexDatabase {
    /// Replace the entire index in a single transaction. A full indexing run
    /// swaps everything at once so readers never observe a half-built index.
    pub fn replace_index(
        &mut self,
        elements: &[CodeElement],
        summaries: &[FileSummary],
        snapshot: &IndexSnapshot,
    ) -> Result<()> {
        let start_time = std::time::Instant::now();
        let now = chrono::Utc::now().timestamp();

        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM code_elements", [])?;
        tx.execute("DELETE FROM file_summaries", [])?;

        let mut element_stmt = tx.prepare(
            "INSERT OR REPLACE INTO code_elements
             (id, name, kind, file_path, start_line, end_line, doc_comment,
              content, embedding, dimensions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;

        let mut summary_stmt = tx.prepare(
            "INSERT OR REPLACE INTO file_summaries
             (file_path, file_type, element_count, summary, embedding, dimensions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for element in elements {
            let bytes = vector_to_blob(&element.embedding);
            element_stmt.execute(params![
                element.id,
                element.name,
                element.kind.as_str(),
                element.file_path,
                element.start_line,
                element.end_line,
                element.doc_comment,
                element.content,
                bytes,
                element.embedding.len() as i64,
                now
            ])?;
        }

        for summary in summaries {
            let bytes = vector_to_blob(&summary.embedding);
            summary_stmt.execute(params![
                summary.file_path,
                summary.file_type,
                summary.element_count as i64,
                summary.summary,
                bytes,
                summary.embedding.len() as i64,
                now
            ])?;
        }

        // Drop statements before committing
        drop(element_stmt);
        drop(summary_stmt);

        Self::write_snapshot(&tx, snapshot)?;

        tx.commit()?;

        debug!(
            "Index replaced: {} elements, {} file summaries in {:.2}ms",
            elements.len(),
            summaries.len(),
            start_time.elapsed().as_millis()
        );
        Ok(())
    }

    /// All elements extracted from one file, in source order
    pub fn get_elements_for_file(&self, file_path: &str) -> Result<Vec<CodeElement>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, file_path, start_line, end_line, doc_comment, content
             FROM code_elements WHERE file_path = ?1 ORDER BY start_line, rowid",
        )?;

        let rows = stmt.query_map(params![file_path], row_to_element)?;
        let mut elements = Vec::new();
        for row in rows {
            elements.push(row?);
        }
        Ok(elements)
    }

    /// Fetch elements by id, preserving the caller's ordering. Ids with no
    /// matching row are silently skipped.
    pub fn get_elements_by_ids(&self, ids: &[String]) -> Result<Vec<CodeElement>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, file_path, start_line, end_line, doc_comment, content
             FROM code_elements WHERE id = ?1",
        )?;

        let mut elements = Vec::with_capacity(ids.len());
        for id in ids {
            match stmt.query_row(params![id], row_to_element) {
                Ok(element) => elements.push(element),
                Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(elements)
    }

    /// Fetch file summaries by path, preserving the caller's ordering
    pub fn get_summaries_by_paths(&self, paths: &[String]) -> Result<Vec<FileSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_path, file_type, element_count, summary
             FROM file_summaries WHERE file_path = ?1",
        )?;

        let mut summaries = Vec::with_capacity(paths.len());
        for path in paths {
            let result = stmt.query_row(params![path], |row| {
                let element_count: i64 = row.get(2)?;
                Ok(FileSummary {
                    file_path: row.get(0)?,
                    file_type: row.get(1)?,
                    element_count: element_count as usize,
                    summary: row.get(3)?,
                    embedding: Vec::new(),
                })
            });
            match result {
                Ok(summary) => summaries.push(summary),
                Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(summaries)
    }

    /// Ids of all elements whose file matches a language or extension filter
    pub fn element_ids_matching(&self, file_type: &str) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, file_path FROM code_elements")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut ids = HashSet::new();
        for row in rows {
            let (id, file_path) = row?;
            if matches_file_type(&file_path, file_type) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    /// Load all element vectors in insertion order for store hydration.
    /// Rows with a corrupted BLOB are skipped with a warning.
    pub fn load_element_vectors(&self) -> Result<Vec<(String, Vec<f32>)>> {
        self.load_vectors("SELECT id, embedding, dimensions FROM code_elements ORDER BY rowid")
    }

    /// Load all file-summary vectors in insertion order
    pub fn load_summary_vectors(&self) -> Result<Vec<(String, Vec<f32>)>> {
        self.load_vectors(
            "SELECT file_path, embedding, dimensions FROM file_summaries ORDER BY rowid",
        )
    }

    fn load_vectors(&self, sql: &str) -> Result<Vec<(String, Vec<f32>)>> {
        let mut stmt = self.conn.prepare(sql)?;

        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            let dimensions: i64 = row.get(2)?;
            Ok((key, bytes, dimensions))
        })?;

        let mut vectors = Vec::new();
        for row in rows {
            let (key, bytes, dimensions) = row?;
            match blob_to_vector(&bytes, dimensions as usize) {
                Ok(vector) => vectors.push((key, vector)),
                Err(e) => {
                    warn!("Skipping corrupted embedding for {}: {}", key, e);
                }
            }
        }
        Ok(vectors)
    }

    /// Distinct indexed file paths, optionally capped, sorted for stable output
    pub fn indexed_file_paths(&self, limit: Option<usize>) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path FROM file_summaries ORDER BY file_path")?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut paths = Vec::new();
        for row in rows {
            paths.push(row?);
        }
        if let Some(cap) = limit {
            paths.truncate(cap);
        }
        Ok(paths)
    }
}
