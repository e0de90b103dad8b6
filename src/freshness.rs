//! Index Freshness Checking
//!
//! Decides whether the stored index snapshot can be trusted for search or
//! whether the workspace should be re-indexed first. The same file discovery
//! rules drive both indexing and freshness so the two never disagree about
//! which files count.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::database::IndexSnapshot;
use crate::utils::to_relative_unix_style;
use crate::workspace::WorkspaceConfig;

/// How many changed paths a staleness report names before cutting off
pub const FILE_PREVIEW_CAP: usize = 5;

/// Trustworthiness of the stored index snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexFreshness {
    /// No snapshot exists (or the last run saw no files). Searching is
    /// impossible until a full index runs.
    NoIndex,
    /// A snapshot exists but can no longer be trusted
    Stale(StaleReason),
    /// The snapshot is recent and the file set is unchanged
    Fresh {
        last_indexed: DateTime<Utc>,
        age_hours: f64,
    },
}

/// Why a snapshot stopped being trustworthy
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaleReason {
    /// Older than the staleness threshold, regardless of file changes
    AgeExceeded { age_hours: f64 },
    /// The on-disk file set no longer matches what was indexed
    FileSetChanged {
        new_count: usize,
        deleted_count: usize,
        /// Up to FILE_PREVIEW_CAP new paths, sorted
        new_files: Vec<String>,
        /// Up to FILE_PREVIEW_CAP deleted paths, sorted
        deleted_files: Vec<String>,
    },
}

impl IndexFreshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, IndexFreshness::Fresh { .. })
    }

    /// Human-readable explanation of the verdict
    pub fn reason(&self) -> String {
        match self {
            IndexFreshness::NoIndex => "No index found".to_string(),
            IndexFreshness::Stale(StaleReason::AgeExceeded { age_hours }) => {
                format!("Index is {:.1} hours old", age_hours)
            }
            IndexFreshness::Stale(StaleReason::FileSetChanged {
                new_count,
                deleted_count,
                ..
            }) => format!("{} new files, {} deleted files", new_count, deleted_count),
            IndexFreshness::Fresh { age_hours, .. } => {
                format!("Index is {:.1} hours old and up to date", age_hours)
            }
        }
    }

    /// What the caller should do about it, when anything
    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            IndexFreshness::NoIndex => Some("Run full indexing"),
            IndexFreshness::Stale(StaleReason::AgeExceeded { .. }) => Some("Consider re-indexing"),
            IndexFreshness::Stale(StaleReason::FileSetChanged { .. }) => {
                Some("Run incremental or full indexing")
            }
            IndexFreshness::Fresh { .. } => None,
        }
    }
}

/// Check whether the snapshot is still trustworthy. Read-only: the caller
/// decides whether to re-index.
pub fn check_freshness(
    root: &Path,
    config: &WorkspaceConfig,
    snapshot: Option<&IndexSnapshot>,
) -> IndexFreshness {
    let snapshot = match snapshot {
        Some(snapshot) => snapshot,
        None => return IndexFreshness::NoIndex,
    };

    // A run that indexed nothing left nothing to search
    if snapshot.files.is_empty() {
        return IndexFreshness::NoIndex;
    }

    let age_hours = age_in_hours(snapshot.last_indexed, Utc::now());
    if age_hours > config.staleness_hours as f64 {
        return IndexFreshness::Stale(StaleReason::AgeExceeded { age_hours });
    }

    let current: HashSet<String> = scan_workspace_files(root, config).into_iter().collect();
    let indexed: HashSet<String> = snapshot.files.iter().cloned().collect();

    let mut new_files: Vec<String> = current.difference(&indexed).cloned().collect();
    let mut deleted_files: Vec<String> = indexed.difference(&current).cloned().collect();

    if !new_files.is_empty() || !deleted_files.is_empty() {
        new_files.sort();
        deleted_files.sort();
        let new_count = new_files.len();
        let deleted_count = deleted_files.len();
        new_files.truncate(FILE_PREVIEW_CAP);
        deleted_files.truncate(FILE_PREVIEW_CAP);

        return IndexFreshness::Stale(StaleReason::FileSetChanged {
            new_count,
            deleted_count,
            new_files,
            deleted_files,
        });
    }

    IndexFreshness::Fresh {
        last_indexed: snapshot.last_indexed,
        age_hours,
    }
}

fn age_in_hours(last_indexed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - last_indexed).num_seconds() as f64 / 3600.0
}

/// Enumerate the files indexing would cover, as workspace-relative paths
/// with forward slashes, in deterministic traversal order.
///
/// Inclusion rules: recognized extension, not matched by an ignore pattern,
/// and under the configured size cap. Unreadable entries are skipped.
pub fn scan_workspace_files(root: &Path, config: &WorkspaceConfig) -> Vec<String> {
    let ignore = build_ignore_set(&config.ignore_patterns);

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during workspace scan: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !config.indexed_extensions.contains(&extension) {
            continue;
        }

        let relative = match to_relative_unix_style(entry.path(), root) {
            Some(relative) => relative,
            None => continue,
        };

        if ignore.is_match(&relative) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) if metadata.len() > config.max_file_size as u64 => {
                debug!("Skipping oversized file: {}", relative);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Skipping file with unreadable metadata {}: {}", relative, e);
                continue;
            }
        }

        files.push(relative);
    }

    files
}

/// Compile ignore patterns into a matcher. Invalid patterns are dropped with
/// a warning rather than failing the whole scan.
fn build_ignore_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => {
                warn!("Ignoring invalid ignore pattern '{}': {}", pattern, e);
            }
        }
    }

    match builder.build() {
        Ok(set) => set,
        Err(e) => {
            warn!("Failed to build ignore set, scanning everything: {}", e);
            GlobSet::empty()
        }
    }
}
