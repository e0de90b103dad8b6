// Similarity search tests over a freshly indexed workspace: ranking,
// result shaping, file-type filters, the no-index failure mode, and the
// search trail left in the session.

use std::sync::Arc;

use crate::embeddings::HashEmbedder;
use crate::errors::VestigeError;
use crate::index::{EmbeddingIndex, SearchLogEntry, SEARCH_TYPE_CODE, SEARCH_TYPE_FILES};
use crate::session::{SessionState, keys};
use crate::tests::helpers::{python_project, FailingEmbedder};
use crate::workspace::VestigeWorkspace;

fn open_index(workspace: &VestigeWorkspace) -> EmbeddingIndex {
    let embedder = Arc::new(HashEmbedder::new(workspace.config.embedding_dimensions));
    EmbeddingIndex::open(workspace, embedder).expect("Failed to open index")
}

fn indexed_project() -> (tempfile::TempDir, EmbeddingIndex, SessionState) {
    let (temp, workspace) = python_project();
    let index = open_index(&workspace);
    let session = SessionState::new();
    index
        .index_codebase(&session, None)
        .expect("Indexing should succeed");
    (temp, index, session)
}

/// Test: searching before the first index run is a distinct failure
#[test]
fn test_search_without_an_index_fails() {
    let (_temp, workspace) = python_project();
    let index = open_index(&workspace);
    let session = SessionState::new();

    let result = index.search_elements(&session, "anything at all", 5, None);
    assert!(matches!(result, Err(VestigeError::IndexUnavailable)));

    assert!(matches!(
        index.search_files(&session, "anything at all", 5),
        Err(VestigeError::IndexUnavailable)
    ));

    // The failed attempts are still part of the search history.
    let history: Vec<SearchLogEntry> = session.get(keys::SEARCH_HISTORY).expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| !e.successful && e.results_count == 0));
}

/// Test: a search failing past the availability check still lands in the
/// history
///
/// The embedding collaborator can error at query time even though the index
/// on disk is intact; the attempt must be logged unsuccessful, not vanish.
#[test]
fn test_failed_searches_still_land_in_history() {
    let (_temp, workspace) = python_project();
    {
        let index = open_index(&workspace);
        let session = SessionState::new();
        index
            .index_codebase(&session, None)
            .expect("Indexing should succeed");
    }

    // Reopen over the persisted index with an embedder that can no longer
    // embed queries.
    let embedder = Arc::new(FailingEmbedder {
        dimensions: workspace.config.embedding_dimensions,
    });
    let broken = EmbeddingIndex::open(&workspace, embedder).expect("Failed to reopen index");
    let session = SessionState::new();

    assert!(
        broken
            .search_elements(&session, "validate credentials", 5, None)
            .is_err()
    );
    assert!(broken.search_files(&session, "render chart", 5).is_err());

    let history: Vec<SearchLogEntry> = session.get(keys::SEARCH_HISTORY).expect("history");
    assert_eq!(history.len(), 2, "one entry per failed attempt");
    assert!(history.iter().all(|e| !e.successful && e.results_count == 0));
    assert_eq!(history[0].search_type, SEARCH_TYPE_CODE);
    assert_eq!(history[1].search_type, SEARCH_TYPE_FILES);

    let counters = session.counters(keys::SEARCH_COUNTERS);
    assert_eq!(counters.get(SEARCH_TYPE_CODE), Some(&1));
    assert_eq!(counters.get(SEARCH_TYPE_FILES), Some(&1));
}

/// Test: the element whose words match the query ranks first
#[test]
fn test_search_finds_semantically_close_elements() {
    let (_temp, index, session) = indexed_project();

    let hits = index
        .search_elements(&session, "validate credentials password user store", 5, None)
        .expect("Search should succeed");

    assert!(!hits.is_empty());
    assert_eq!(hits[0].rank, 1);
    assert_eq!(hits[0].element_name, "validate_credentials");
    assert_eq!(hits[0].element_kind, "function");
    assert_eq!(hits[0].file_path, "src/auth.py");
    assert!(hits[0].start_line >= 1);
    assert!(hits[0].end_line >= hits[0].start_line);
    assert!(hits[0].docstring.contains("username and password"));
    assert!(!hits[0].content_preview.is_empty());

    // Ranks are consecutive and scores never increase.
    for (i, hit) in hits.iter().enumerate() {
        assert_eq!(hit.rank, i + 1);
    }
    for pair in hits.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
}

/// Test: k caps the result count
#[test]
fn test_k_caps_result_count() {
    let (_temp, index, session) = indexed_project();

    let one = index
        .search_elements(&session, "password", 1, None)
        .expect("Search should succeed");
    assert_eq!(one.len(), 1);

    let all = index
        .search_elements(&session, "password", 50, None)
        .expect("Search should succeed");
    assert!(all.len() > 1, "a generous k returns every indexed element");
}

/// Test: a file-type filter restricts hits to matching files
#[test]
fn test_file_type_filter_restricts_hits() {
    let (_temp, index, session) = indexed_project();

    let python_only = index
        .search_elements(&session, "render svg chart", 10, Some("python"))
        .expect("Search should succeed");
    assert!(!python_only.is_empty());
    assert!(python_only.iter().all(|h| h.file_path.ends_with(".py")));

    let js_only = index
        .search_elements(&session, "render svg chart", 10, Some("js"))
        .expect("Search should succeed");
    assert_eq!(js_only.len(), 1);
    assert_eq!(js_only[0].element_name, "render_svg_chart");

    let no_such = index
        .search_elements(&session, "render svg chart", 10, Some("tsx"))
        .expect("Search should succeed");
    assert!(no_such.is_empty());

    // A blank filter means no filter.
    let unfiltered = index
        .search_elements(&session, "render svg chart", 50, None)
        .expect("Search should succeed");
    let blank = index
        .search_elements(&session, "render svg chart", 50, Some("  "))
        .expect("Search should succeed");
    assert_eq!(blank.len(), unfiltered.len());
}

/// Test: every search leaves a trail the planning layer can read
#[test]
fn test_search_records_session_bookkeeping() {
    let (_temp, index, session) = indexed_project();

    let query = "validate credentials password";
    let hits = index
        .search_elements(&session, query, 5, None)
        .expect("Search should succeed");

    let history: Vec<SearchLogEntry> = session.get(keys::SEARCH_HISTORY).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, query);
    assert_eq!(history[0].search_type, SEARCH_TYPE_CODE);
    assert_eq!(history[0].results_count, hits.len());
    assert!(history[0].successful);

    assert_eq!(session.get::<String>(keys::LAST_SEARCH_QUERY), Some(query.to_string()));

    let last: Vec<serde_json::Value> = session.get(keys::LAST_SEARCH_RESULTS).expect("results");
    assert_eq!(last.len(), hits.len());

    let discovered: Vec<String> = session.get(keys::DISCOVERED_FILES).expect("discovered");
    assert!(discovered.contains(&"src/auth.py".to_string()));
    let mut sorted = discovered.clone();
    sorted.sort();
    assert_eq!(discovered, sorted, "discovered files stay sorted");

    let counters = session.counters(keys::SEARCH_COUNTERS);
    assert_eq!(counters.get(SEARCH_TYPE_CODE), Some(&1));
}

/// Test: logged queries are bounded like every other stored payload
#[test]
fn test_long_queries_are_truncated_in_history() {
    let (_temp, index, session) = indexed_project();

    let long_query = "credentials ".repeat(30);
    index
        .search_elements(&session, &long_query, 3, None)
        .expect("Search should succeed");

    let history: Vec<SearchLogEntry> = session.get(keys::SEARCH_HISTORY).expect("history");
    assert_eq!(history[0].query.chars().count(), 200);
}

/// Test: file search ranks whole-file summaries
#[test]
fn test_file_search_ranks_summaries() {
    let (_temp, index, session) = indexed_project();

    let hits = index
        .search_files(&session, "javascript render svg chart", 5)
        .expect("Search should succeed");

    assert!(!hits.is_empty());
    assert_eq!(hits[0].file_path, "src/render.js");
    assert_eq!(hits[0].file_type, "javascript");
    assert!(hits[0].element_count >= 1);
    assert!(hits[0].summary.contains("javascript file"));

    assert!(session.contains(keys::LAST_FILE_SEARCH_RESULTS));
    let counters = session.counters(keys::SEARCH_COUNTERS);
    assert_eq!(counters.get(SEARCH_TYPE_FILES), Some(&1));
}

/// Test: per-file element listing is source-ordered and remembered
#[test]
fn test_get_elements_of_returns_source_order_and_records_context() {
    let (_temp, index, session) = indexed_project();

    let elements = index
        .get_elements_of(&session, "src/auth.py")
        .expect("Lookup should succeed");

    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0].name, "validate_credentials");
    assert_eq!(elements[1].name, "hash_password");
    assert!(elements[0].start_line < elements[1].start_line);

    assert_eq!(
        session.get::<String>(keys::LAST_ANALYZED_FILE),
        Some("src/auth.py".to_string())
    );

    let summary = EmbeddingIndex::search_summary(&session);
    assert_eq!(summary.analyzed_files, vec!["src/auth.py".to_string()]);
}

/// Test: the search summary aggregates the whole session
#[test]
fn test_search_summary_reflects_activity() {
    let (_temp, index, session) = indexed_project();

    index
        .search_elements(&session, "validate credentials password", 3, None)
        .expect("Search should succeed");
    index
        .search_files(&session, "javascript render svg chart", 3)
        .expect("Search should succeed");

    let summary = EmbeddingIndex::search_summary(&session);
    assert_eq!(summary.recent_searches.len(), 2);
    assert_eq!(summary.last_search_query, "validate credentials password");
    assert!(summary.discovered_files.contains(&"src/auth.py".to_string()));
    assert!(summary.discovered_files.contains(&"src/render.js".to_string()));
    assert_eq!(summary.search_counters.get(SEARCH_TYPE_CODE), Some(&1));
    assert_eq!(summary.search_counters.get(SEARCH_TYPE_FILES), Some(&1));
}

/// Test: a new process sees the persisted index without re-indexing
///
/// Opening the index hydrates the vector stores from SQLite, so search
/// works immediately in a second instance over the same workspace.
#[test]
fn test_reopened_index_serves_search_from_disk() {
    let (_temp, workspace) = python_project();
    {
        let index = open_index(&workspace);
        let session = SessionState::new();
        index.index_codebase(&session, None).expect("Indexing should succeed");
    }

    let reopened = open_index(&workspace);
    let session = SessionState::new();
    let hits = reopened
        .search_elements(&session, "validate credentials password user store", 3, None)
        .expect("Search should succeed after reopening");

    assert!(!hits.is_empty());
    assert_eq!(hits[0].element_name, "validate_credentials");
}
