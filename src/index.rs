//! Embedding Index - Semantic Code Intelligence
//!
//! Walks the workspace, extracts code elements, embeds them, and serves
//! similarity search over both individual elements and whole files. The
//! SQLite database is the source of truth; in-memory vector stores are
//! hydrated from it on open and swapped wholesale after each indexing run,
//! so readers never observe a half-built index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::database::{IndexDatabase, IndexSnapshot};
use crate::embeddings::vector_store::VectorStore;
use crate::embeddings::{TextEmbedder, build_element_text};
use crate::errors::{Result, VestigeError};
use crate::extractors::{CodeElement, FileSummary, extract_elements};
use crate::freshness::{IndexFreshness, check_freshness, scan_workspace_files};
use crate::session::{SessionState, keys};
use crate::utils::{preview_chars, truncate_chars};
use crate::workspace::{VestigeWorkspace, WorkspaceConfig};

/// Search type recorded for element searches
pub const SEARCH_TYPE_CODE: &str = "semantic_code";
/// Search type recorded for file-summary searches
pub const SEARCH_TYPE_FILES: &str = "file_search";

const INDEXING_LOG_CAP: usize = 10;
const SEARCH_HISTORY_CAP: usize = 50;
const RECENT_OPERATIONS: usize = 5;
const RECENT_SEARCHES: usize = 10;
const FILE_SAMPLE: usize = 10;
const ELEMENT_PREVIEW_LEN: usize = 200;
const SUMMARY_PREVIEW_LEN: usize = 300;
const QUERY_RECORD_LEN: usize = 200;

/// Outcome of a full indexing run
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub files_indexed: usize,
    pub total_elements: usize,
    /// Per-file failures absorbed by the run, plus the abort marker when
    /// the run was cancelled partway
    pub errors: Vec<String>,
    pub indexed_files: Vec<String>,
    pub aborted: bool,
}

impl IndexReport {
    /// Human-readable completion message
    pub fn message(&self) -> String {
        let mut msg = format!(
            "Indexing complete! Files indexed: {}, Code elements found: {}",
            self.files_indexed, self.total_elements
        );
        if !self.errors.is_empty() {
            msg.push_str(&format!(", Errors: {}", self.errors.len()));
        }
        msg
    }
}

/// One entry in the session indexing log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingLogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub status: String,
    #[serde(default)]
    pub files_indexed: usize,
    #[serde(default)]
    pub total_elements: usize,
    #[serde(default)]
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexingLogEntry {
    fn finished(report: &IndexReport) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: "full_index".to_string(),
            status: if report.aborted { "aborted" } else { "completed" }.to_string(),
            files_indexed: report.files_indexed,
            total_elements: report.total_elements,
            errors: report.errors.len(),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: "full_index".to_string(),
            status: "failed".to_string(),
            files_indexed: 0,
            total_elements: 0,
            errors: 0,
            error: Some(error),
        }
    }
}

/// Compact index description kept under the `index_status` session key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatusRecord {
    pub last_indexed: DateTime<Utc>,
    pub files_count: usize,
    pub elements_count: usize,
    pub has_errors: bool,
}

/// One element search hit, ranked best-first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementHit {
    pub rank: usize,
    pub similarity_score: f32,
    pub element_name: String,
    pub element_kind: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content_preview: String,
    pub docstring: String,
}

/// One file search hit, ranked best-first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHit {
    pub rank: usize,
    pub similarity_score: f32,
    pub file_path: String,
    pub file_type: String,
    pub element_count: usize,
    pub summary: String,
}

/// One entry in the session search history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub search_type: String,
    pub results_count: usize,
    pub successful: bool,
}

/// Element digest stored per analyzed file under `file_contexts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContextElement {
    pub name: String,
    pub kind: String,
    pub start_line: u32,
    pub end_line: u32,
    pub docstring: String,
}

/// What the session remembers about one analyzed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContext {
    pub timestamp: DateTime<Utc>,
    pub element_count: usize,
    pub elements: Vec<FileContextElement>,
}

/// Index status read model: persisted snapshot merged with this session's
/// bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub index_exists: bool,
    /// RFC 3339 timestamp, or "Never"
    pub last_indexed: String,
    pub files_count: usize,
    pub elements_count: usize,
    pub has_errors: bool,
    pub recent_operations: Vec<IndexingLogEntry>,
    pub indexed_files_sample: Vec<String>,
    pub total_indexed_files: usize,
}

/// Summary of all search activity in this session
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
    pub search_counters: HashMap<String, u64>,
    pub discovered_files: Vec<String>,
    pub recent_searches: Vec<SearchLogEntry>,
    pub last_search_query: String,
    pub analyzed_files: Vec<String>,
}

/// The semantic index over one workspace
pub struct EmbeddingIndex {
    root: PathBuf,
    config: WorkspaceConfig,
    db: Mutex<IndexDatabase>,
    embedder: Arc<dyn TextEmbedder>,
    element_store: RwLock<VectorStore>,
    file_store: RwLock<VectorStore>,
}

impl EmbeddingIndex {
    /// Open the index for a workspace, hydrating the in-memory vector
    /// stores from whatever the database already holds.
    pub fn open(workspace: &VestigeWorkspace, embedder: Arc<dyn TextEmbedder>) -> Result<Self> {
        let db = IndexDatabase::new(workspace.db_path())?;

        let mut element_store = VectorStore::new(embedder.dimensions());
        for (id, vector) in db.load_element_vectors()? {
            if let Err(e) = element_store.store_vector(id, vector) {
                warn!("Dropping stored element vector: {}", e);
            }
        }

        let mut file_store = VectorStore::new(embedder.dimensions());
        for (path, vector) in db.load_summary_vectors()? {
            if let Err(e) = file_store.store_vector(path, vector) {
                warn!("Dropping stored file vector: {}", e);
            }
        }

        if !element_store.is_empty() {
            info!(
                "Hydrated vector stores: {} elements, {} files",
                element_store.len(),
                file_store.len()
            );
        }

        Ok(Self {
            root: workspace.root.clone(),
            config: workspace.config.clone(),
            db: Mutex::new(db),
            embedder,
            element_store: RwLock::new(element_store),
            file_store: RwLock::new(file_store),
        })
    }

    /// Full index of the workspace: scan, extract, embed, and atomically
    /// replace the previous index. Per-file failures are absorbed into the
    /// error list rather than aborting the run. The cancel flag is checked
    /// between file units; an aborted run commits the partial index with the
    /// abort recorded in its error list.
    pub fn index_codebase(
        &self,
        session: &SessionState,
        cancel: Option<&AtomicBool>,
    ) -> Result<IndexReport> {
        info!("Starting full index of {}", self.root.display());

        let files = scan_workspace_files(&self.root, &self.config);
        let total_files = files.len();

        let mut elements: Vec<CodeElement> = Vec::new();
        let mut summaries: Vec<FileSummary> = Vec::new();
        let mut covered: Vec<String> = Vec::new();
        let mut indexed_files: Vec<String> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut aborted = false;

        for (position, relative) in files.iter().enumerate() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                let marker = format!("indexing aborted after {} of {} files", position, total_files);
                warn!("{}", marker);
                errors.push(marker);
                aborted = true;
                break;
            }

            covered.push(relative.clone());
            match self.index_one_file(relative) {
                Ok((mut file_elements, summary)) => {
                    elements.append(&mut file_elements);
                    summaries.push(summary);
                    indexed_files.push(relative.clone());
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", relative, e);
                    errors.push(format!("{}: {}", relative, e));
                }
            }
        }

        let report = IndexReport {
            files_indexed: indexed_files.len(),
            total_elements: elements.len(),
            errors,
            indexed_files,
            aborted,
        };

        // An abort before any file was attempted leaves the previous index
        // in place; there is no partial progress worth keeping.
        if aborted && covered.is_empty() {
            session.append_capped(
                keys::INDEXING_LOG,
                &IndexingLogEntry::finished(&report),
                INDEXING_LOG_CAP,
            );
            return Ok(report);
        }

        let snapshot = IndexSnapshot::new(covered, report.total_elements, report.errors.clone());

        if let Err(e) = self.db().replace_index(&elements, &summaries, &snapshot) {
            session.append_capped(
                keys::INDEXING_LOG,
                &IndexingLogEntry::failed(format!("Indexing failed: {}", e)),
                INDEXING_LOG_CAP,
            );
            return Err(e);
        }

        // Swap in the fresh stores only after the database commit succeeded
        let mut element_store = VectorStore::new(self.embedder.dimensions());
        for element in &elements {
            element_store.store_vector(element.id.clone(), element.embedding.clone())?;
        }
        let mut file_store = VectorStore::new(self.embedder.dimensions());
        for summary in &summaries {
            file_store.store_vector(summary.file_path.clone(), summary.embedding.clone())?;
        }
        *self.elements_write() = element_store;
        *self.files_write() = file_store;

        session.append_capped(
            keys::INDEXING_LOG,
            &IndexingLogEntry::finished(&report),
            INDEXING_LOG_CAP,
        );
        session.set(
            keys::INDEX_STATUS,
            &IndexStatusRecord {
                last_indexed: snapshot.last_indexed,
                files_count: report.files_indexed,
                elements_count: report.total_elements,
                has_errors: !report.errors.is_empty(),
            },
        );
        session.set(keys::INDEXED_FILES, &report.indexed_files);
        if !report.aborted {
            session.increment(keys::INDEXING_COUNTERS, "full_index");
        }

        info!("{}", report.message());
        Ok(report)
    }

    fn index_one_file(&self, relative: &str) -> Result<(Vec<CodeElement>, FileSummary)> {
        let content = std::fs::read_to_string(self.root.join(relative))?;

        let mut elements = extract_elements(relative, &content)?;
        for element in &mut elements {
            element.embedding = self.embedder.embed(&build_element_text(element))?;
        }

        let mut summary = FileSummary::compose(relative, &elements);
        summary.embedding = self.embedder.embed(&summary.summary)?;

        Ok((elements, summary))
    }

    /// Search indexed code elements by meaning. `file_type` optionally
    /// restricts hits to one language or extension.
    pub fn search_elements(
        &self,
        session: &SessionState,
        query: &str,
        k: usize,
        file_type: Option<&str>,
    ) -> Result<Vec<ElementHit>> {
        // Every attempt lands in the history, failures included.
        match self.rank_elements(query, k, file_type) {
            Ok(hits) => {
                self.log_search(session, query, SEARCH_TYPE_CODE, hits.len(), true);
                session.set(keys::LAST_SEARCH_RESULTS, &hits);
                session.set(keys::LAST_SEARCH_QUERY, &query);
                self.record_discovered(session, hits.iter().map(|h| h.file_path.clone()));
                Ok(hits)
            }
            Err(e) => {
                self.log_search(session, query, SEARCH_TYPE_CODE, 0, false);
                Err(e)
            }
        }
    }

    fn rank_elements(
        &self,
        query: &str,
        k: usize,
        file_type: Option<&str>,
    ) -> Result<Vec<ElementHit>> {
        if self.snapshot()?.is_none() {
            return Err(VestigeError::IndexUnavailable);
        }

        let query_vector = self.embedder.embed(query)?;

        let allowed = match file_type.map(str::trim) {
            Some(filter) if !filter.is_empty() => Some(self.db().element_ids_matching(filter)?),
            _ => None,
        };

        let matches = self
            .elements_read()
            .search_similar(&query_vector, k, allowed.as_ref())?;

        let ids: Vec<String> = matches.iter().map(|m| m.element_id.clone()).collect();
        let elements = self.db().get_elements_by_ids(&ids)?;
        let by_id: HashMap<&str, &CodeElement> =
            elements.iter().map(|e| (e.id.as_str(), e)).collect();

        let mut hits = Vec::with_capacity(matches.len());
        for m in &matches {
            let element = match by_id.get(m.element_id.as_str()) {
                Some(element) => *element,
                None => {
                    warn!("Vector id {} missing from database, skipping", m.element_id);
                    continue;
                }
            };
            hits.push(ElementHit {
                rank: hits.len() + 1,
                similarity_score: m.similarity_score,
                element_name: element.name.clone(),
                element_kind: element.kind.to_string(),
                file_path: element.file_path.clone(),
                start_line: element.start_line,
                end_line: element.end_line,
                content_preview: preview_chars(&element.content, ELEMENT_PREVIEW_LEN),
                docstring: element.doc_comment.clone().unwrap_or_default(),
            });
        }

        Ok(hits)
    }

    /// Search file summaries by meaning
    pub fn search_files(
        &self,
        session: &SessionState,
        query: &str,
        k: usize,
    ) -> Result<Vec<FileHit>> {
        match self.rank_files(query, k) {
            Ok(hits) => {
                self.log_search(session, query, SEARCH_TYPE_FILES, hits.len(), true);
                session.set(keys::LAST_FILE_SEARCH_RESULTS, &hits);
                self.record_discovered(session, hits.iter().map(|h| h.file_path.clone()));
                Ok(hits)
            }
            Err(e) => {
                self.log_search(session, query, SEARCH_TYPE_FILES, 0, false);
                Err(e)
            }
        }
    }

    fn rank_files(&self, query: &str, k: usize) -> Result<Vec<FileHit>> {
        if self.snapshot()?.is_none() {
            return Err(VestigeError::IndexUnavailable);
        }

        let query_vector = self.embedder.embed(query)?;
        let matches = self.files_read().search_similar(&query_vector, k, None)?;

        let paths: Vec<String> = matches.iter().map(|m| m.element_id.clone()).collect();
        let summaries = self.db().get_summaries_by_paths(&paths)?;
        let by_path: HashMap<&str, &FileSummary> = summaries
            .iter()
            .map(|s| (s.file_path.as_str(), s))
            .collect();

        let mut hits = Vec::with_capacity(matches.len());
        for m in &matches {
            let summary = match by_path.get(m.element_id.as_str()) {
                Some(summary) => *summary,
                None => {
                    warn!("Vector id {} missing from database, skipping", m.element_id);
                    continue;
                }
            };
            hits.push(FileHit {
                rank: hits.len() + 1,
                similarity_score: m.similarity_score,
                file_path: summary.file_path.clone(),
                file_type: summary.file_type.clone(),
                element_count: summary.element_count,
                summary: preview_chars(&summary.summary, SUMMARY_PREVIEW_LEN),
            });
        }

        Ok(hits)
    }

    /// Every indexed element of one file, in source order. The session
    /// remembers a digest of what was seen under `file_contexts`.
    pub fn get_elements_of(
        &self,
        session: &SessionState,
        file_path: &str,
    ) -> Result<Vec<CodeElement>> {
        if self.snapshot()?.is_none() {
            return Err(VestigeError::IndexUnavailable);
        }

        let elements = self.db().get_elements_for_file(file_path)?;

        let context = FileContext {
            timestamp: Utc::now(),
            element_count: elements.len(),
            elements: elements
                .iter()
                .map(|e| FileContextElement {
                    name: e.name.clone(),
                    kind: e.kind.to_string(),
                    start_line: e.start_line,
                    end_line: e.end_line,
                    docstring: e.doc_comment.clone().unwrap_or_default(),
                })
                .collect(),
        };

        let mut contexts: HashMap<String, FileContext> =
            session.get(keys::FILE_CONTEXTS).unwrap_or_default();
        contexts.insert(file_path.to_string(), context);
        session.set(keys::FILE_CONTEXTS, &contexts);
        session.set(keys::LAST_ANALYZED_FILE, &file_path);

        Ok(elements)
    }

    /// Whether the stored snapshot can still be trusted for search
    pub fn freshness(&self) -> Result<IndexFreshness> {
        let snapshot = self.snapshot()?;
        Ok(check_freshness(&self.root, &self.config, snapshot.as_ref()))
    }

    /// The snapshot of the last indexing run, if one ever completed
    pub fn snapshot(&self) -> Result<Option<IndexSnapshot>> {
        self.db().load_snapshot()
    }

    /// Index status: this session's bookkeeping when present, otherwise the
    /// persisted snapshot, so a fresh session still sees an existing index.
    pub fn status(&self, session: &SessionState) -> Result<IndexStatus> {
        let record: Option<IndexStatusRecord> = session.get(keys::INDEX_STATUS);
        let snapshot = self.snapshot()?;

        let (index_exists, last_indexed, files_count, elements_count, has_errors) =
            match (&record, &snapshot) {
                (Some(record), _) => (
                    true,
                    record.last_indexed.to_rfc3339(),
                    record.files_count,
                    record.elements_count,
                    record.has_errors,
                ),
                (None, Some(snapshot)) => (
                    true,
                    snapshot.last_indexed.to_rfc3339(),
                    snapshot.files.len(),
                    snapshot.elements_count,
                    !snapshot.errors.is_empty(),
                ),
                (None, None) => (false, "Never".to_string(), 0, 0, false),
            };

        let (indexed_files_sample, total_indexed_files) = match (
            session.get::<Vec<String>>(keys::INDEXED_FILES),
            &snapshot,
        ) {
            (Some(files), _) => sample_of(files),
            (None, Some(snapshot)) => sample_of(snapshot.files.clone()),
            (None, None) => (Vec::new(), 0),
        };

        Ok(IndexStatus {
            index_exists,
            last_indexed,
            files_count,
            elements_count,
            has_errors,
            recent_operations: session.tail_as(keys::INDEXING_LOG, RECENT_OPERATIONS),
            indexed_files_sample,
            total_indexed_files,
        })
    }

    /// Summary of this session's search activity
    pub fn search_summary(session: &SessionState) -> SearchSummary {
        let contexts: HashMap<String, FileContext> =
            session.get(keys::FILE_CONTEXTS).unwrap_or_default();
        let mut analyzed_files: Vec<String> = contexts.into_keys().collect();
        analyzed_files.sort();

        SearchSummary {
            search_counters: session.counters(keys::SEARCH_COUNTERS),
            discovered_files: session.get(keys::DISCOVERED_FILES).unwrap_or_default(),
            recent_searches: session.tail_as(keys::SEARCH_HISTORY, RECENT_SEARCHES),
            last_search_query: session.get(keys::LAST_SEARCH_QUERY).unwrap_or_default(),
            analyzed_files,
        }
    }

    fn log_search(
        &self,
        session: &SessionState,
        query: &str,
        search_type: &str,
        results_count: usize,
        successful: bool,
    ) {
        session.append_capped(
            keys::SEARCH_HISTORY,
            &SearchLogEntry {
                timestamp: Utc::now(),
                query: truncate_chars(query, QUERY_RECORD_LEN),
                search_type: search_type.to_string(),
                results_count,
                successful,
            },
            SEARCH_HISTORY_CAP,
        );
        session.increment(keys::SEARCH_COUNTERS, search_type);
    }

    fn record_discovered(&self, session: &SessionState, paths: impl IntoIterator<Item = String>) {
        let mut discovered: HashSet<String> = session
            .get::<Vec<String>>(keys::DISCOVERED_FILES)
            .unwrap_or_default()
            .into_iter()
            .collect();
        discovered.extend(paths);

        let mut discovered: Vec<String> = discovered.into_iter().collect();
        discovered.sort();
        session.set(keys::DISCOVERED_FILES, &discovered);
    }

    fn db(&self) -> MutexGuard<'_, IndexDatabase> {
        match self.db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Index database mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn elements_read(&self) -> RwLockReadGuard<'_, VectorStore> {
        match self.element_store.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Element store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn elements_write(&self) -> RwLockWriteGuard<'_, VectorStore> {
        match self.element_store.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Element store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn files_read(&self) -> RwLockReadGuard<'_, VectorStore> {
        match self.file_store.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("File store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn files_write(&self) -> RwLockWriteGuard<'_, VectorStore> {
        match self.file_store.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("File store lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn sample_of(files: Vec<String>) -> (Vec<String>, usize) {
    let total = files.len();
    let mut sample = files;
    sample.truncate(FILE_SAMPLE);
    (sample, total)
}
