use thiserror::Error;

/// Closed error taxonomy for vestige operations.
///
/// Blocking outcomes surface as distinct variants so callers can react
/// differently: a `BoundaryViolation` or `QueryRejected` means the request
/// itself is unacceptable, `RateLimited` means try again later, and
/// `IndexUnavailable` means run indexing first. Per-file indexing failures
/// are NOT errors; they are absorbed into the index snapshot's error list.
#[derive(Debug, Error)]
pub enum VestigeError {
    #[error("Path '{target}' violates the workspace boundary: {}", issues.join("; "))]
    BoundaryViolation { target: String, issues: Vec<String> },

    #[error("Query rejected by security policy: {}", issues.join("; "))]
    QueryRejected { issues: Vec<String> },

    #[error("Rate limit exceeded: more than {max_queries} queries in {window_secs}s, retry later")]
    RateLimited { max_queries: usize, window_secs: u64 },

    #[error("No code index found for this workspace. Run indexing first")]
    IndexUnavailable,

    #[error("Diagnostic backend failed: {0}")]
    DiagnosticFailure(String),

    #[error("Embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid policy pattern: {0}")]
    PolicyError(#[from] regex::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VestigeError>;
