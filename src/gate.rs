// Security gate - the single choke point in front of every path-bearing,
// content-bearing, or query-bearing operation. Nothing touches the
// filesystem, the index, or the search surface without a verdict from here.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{Result, VestigeError};
use crate::session::{SessionState, keys};
use crate::utils::truncate_chars;
use crate::workspace::WorkspaceConfig;

/// Path fragments that are never acceptable, matched case-insensitively
/// against the raw request before any resolution happens.
const DANGEROUS_PATH_PATTERNS: &[&str] = &[
    r"\.\./",
    r"/etc/",
    r"/var/",
    r"/usr/",
    r"/bin/",
    r"/sbin/",
    r"~/\.ssh",
    r"~/\.aws",
    r"/proc/",
    r"/sys/",
];

/// Extensions that flag an operation for review without blocking it.
const SENSITIVE_EXTENSIONS: &[&str] = &[
    ".sh", ".bat", ".exe", ".dll", ".so", ".key", ".pem", ".p12", ".pfx", ".env", ".config",
];

/// Substrings that mark risky shell or dynamic-execution constructs in
/// proposed content. Matched against the lowercased payload.
const DANGEROUS_OPERATIONS: &[&str] = &[
    "rm -rf",
    "sudo",
    "chmod 777",
    ">/dev/null",
    "2>&1",
    "exec(",
    "eval(",
    "__import__",
    "subprocess",
    "os.system",
];

/// Injection shapes a legitimate semantic query has no business containing.
const SUSPICIOUS_QUERY_PATTERNS: &[&str] = &[
    r"<script",
    r"javascript:",
    r"\bUNION\b",
    r"\bSELECT\b",
    r"\bDROP\b",
    r"\bDELETE\b",
];

const SECURITY_LOG_CAP: usize = 100;
const SECURITY_WARNINGS_CAP: usize = 50;
const QUERY_LOG_CAP: usize = 50;

const MAX_TARGET_LEN: usize = 100;
const MAX_QUERY_LEN: usize = 200;
const RATE_WINDOW_SECS: u64 = 60;

/// Severity of a policy finding. Ordering is escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Outcome of screening one path, content payload, or query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityVerdict {
    /// False exactly when severity reached `error`.
    pub valid: bool,
    pub severity: Severity,
    pub issues: Vec<String>,
    /// The screened subject, truncated for storage.
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Allowed,
    Blocked,
    RateLimited,
}

/// One entry in the session's security audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub target: String,
    pub action: AuditAction,
    pub verdict: Option<SecurityVerdict>,
}

/// One entry in the query screening log. Kept separate from the main audit
/// trail because the rate limiter derives its sliding window from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAuditRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub query: String,
    pub issues: Vec<String>,
    pub action: AuditAction,
}

/// Non-blocking policy finding recorded for later review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyWarningRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub issues: Vec<String>,
}

/// Read model over the session's security bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySummary {
    pub counters: HashMap<String, u64>,
    pub recent_log: Vec<AuditRecord>,
    pub recent_warnings: Vec<PolicyWarningRecord>,
    pub recent_query_log: Vec<QueryAuditRecord>,
}

/// Screens paths, content payloads, and search queries against a fixed
/// policy, records every decision in the session, and terminates blocking
/// outcomes before they reach any other component.
pub struct SecurityGate {
    root: PathBuf,
    dangerous_paths: Vec<Regex>,
    suspicious_queries: Vec<Regex>,
    max_content_bytes: usize,
    max_queries_per_minute: usize,
}

impl SecurityGate {
    pub fn new(root: &Path, config: &WorkspaceConfig) -> Result<Self> {
        // Canonicalize so containment checks compare real components. The
        // root must already exist; request targets may not.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Ok(Self {
            root,
            dangerous_paths: compile_patterns(DANGEROUS_PATH_PATTERNS)?,
            suspicious_queries: compile_patterns(SUSPICIOUS_QUERY_PATTERNS)?,
            max_content_bytes: config.max_content_bytes,
            max_queries_per_minute: config.max_queries_per_minute,
        })
    }

    /// Screen a file path. Traversal sequences, denylisted system
    /// locations, and anything resolving outside the workspace root are
    /// blocking; sensitive extensions only warn.
    pub fn validate_path(&self, state: &SessionState, path: &str) -> SecurityVerdict {
        let mut issues = Vec::new();
        let mut severity = Severity::Info;

        for (raw, regex) in DANGEROUS_PATH_PATTERNS.iter().zip(&self.dangerous_paths) {
            if regex.is_match(path) {
                issues.push(format!("Dangerous path pattern detected: {}", raw));
                severity = Severity::Error;
            }
        }

        if !resolves_within_root(&self.root, path) {
            issues.push("Path is outside project directory".to_string());
            severity = Severity::Error;
        }

        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            let dotted = format!(".{}", ext.to_lowercase());
            if SENSITIVE_EXTENSIONS.contains(&dotted.as_str()) {
                issues.push(format!("Sensitive file type: {}", dotted));
                if severity == Severity::Info {
                    severity = Severity::Warning;
                }
            }
        }

        let verdict = SecurityVerdict {
            valid: severity != Severity::Error,
            severity,
            issues,
            target: truncate_chars(path, MAX_TARGET_LEN),
        };
        self.record_decision(state, "validate_path", &verdict);
        verdict
    }

    /// Screen `path` and enforce the outcome: a blocking verdict becomes a
    /// `BoundaryViolation` and the operation ends here.
    pub fn authorize_path(&self, state: &SessionState, path: &str) -> Result<SecurityVerdict> {
        let verdict = self.validate_path(state, path);
        if !verdict.valid {
            return Err(VestigeError::BoundaryViolation {
                target: verdict.target,
                issues: verdict.issues,
            });
        }
        Ok(verdict)
    }

    /// Screen proposed content. Findings warn and are recorded; they never
    /// block, so the verdict is always valid.
    pub fn validate_content(&self, state: &SessionState, content: &str) -> SecurityVerdict {
        let mut issues = Vec::new();
        let mut severity = Severity::Info;

        let lowered = content.to_lowercase();
        for &operation in DANGEROUS_OPERATIONS {
            if lowered.contains(operation) {
                issues.push(format!("Potentially dangerous operation: {}", operation));
                severity = Severity::Warning;
            }
        }

        if content.len() > self.max_content_bytes {
            issues.push(format!(
                "Content is very large (>{}MB)",
                self.max_content_bytes / (1024 * 1024)
            ));
            if severity == Severity::Info {
                severity = Severity::Warning;
            }
        }

        let verdict = SecurityVerdict {
            valid: true,
            severity,
            issues,
            target: format!("content ({} bytes)", content.len()),
        };

        if verdict.severity == Severity::Warning {
            let warning = PolicyWarningRecord {
                timestamp: Utc::now(),
                kind: "content_validation".to_string(),
                issues: verdict.issues.clone(),
            };
            state.append_capped(keys::SECURITY_WARNINGS, &warning, SECURITY_WARNINGS_CAP);
        }
        self.record_decision(state, "validate_content", &verdict);
        verdict
    }

    /// Screen a search query. Injection patterns reject the query outright;
    /// too many queries inside the sliding window reject it as rate-limited,
    /// a distinct outcome the caller can retry later. Every call appends
    /// exactly one entry to the query log.
    pub fn validate_query(&self, state: &SessionState, query: &str) -> Result<SecurityVerdict> {
        let now = Utc::now();

        let mut issues = Vec::new();
        for (raw, regex) in SUSPICIOUS_QUERY_PATTERNS.iter().zip(&self.suspicious_queries) {
            if regex.is_match(query) {
                issues.push(format!("Suspicious pattern in query: {}", raw));
            }
        }

        if !issues.is_empty() {
            self.record_query(state, now, query, &issues, AuditAction::Blocked);
            state.increment(keys::SECURITY_COUNTERS, "blocked");
            warn!(
                "🚫 Rejected query '{}': {}",
                truncate_chars(query, 80),
                issues.join("; ")
            );
            return Err(VestigeError::QueryRejected { issues });
        }

        let window = Duration::seconds(RATE_WINDOW_SECS as i64);
        let previous: Vec<QueryAuditRecord> = state.get(keys::QUERY_LOG).unwrap_or_default();
        if queries_in_window(&previous, now, window) >= self.max_queries_per_minute {
            self.record_query(state, now, query, &[], AuditAction::RateLimited);
            state.increment(keys::SECURITY_COUNTERS, "blocked");
            debug!("Rate limit hit after {} recent queries", previous.len());
            return Err(VestigeError::RateLimited {
                max_queries: self.max_queries_per_minute,
                window_secs: RATE_WINDOW_SECS,
            });
        }

        self.record_query(state, now, query, &[], AuditAction::Allowed);
        state.increment(keys::SECURITY_COUNTERS, "allowed");
        Ok(SecurityVerdict {
            valid: true,
            severity: Severity::Info,
            issues: Vec::new(),
            target: truncate_chars(query, MAX_QUERY_LEN),
        })
    }

    /// Counters plus the most recent audit, warning, and query entries.
    pub fn security_summary(state: &SessionState) -> SecuritySummary {
        SecuritySummary {
            counters: state.counters(keys::SECURITY_COUNTERS),
            recent_log: state.tail_as(keys::SECURITY_LOG, 10),
            recent_warnings: state.tail_as(keys::SECURITY_WARNINGS, 5),
            recent_query_log: state.tail_as(keys::QUERY_LOG, 10),
        }
    }

    fn record_decision(&self, state: &SessionState, operation: &str, verdict: &SecurityVerdict) {
        let action = if verdict.valid {
            AuditAction::Allowed
        } else {
            AuditAction::Blocked
        };
        let record = AuditRecord {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            target: verdict.target.clone(),
            action,
            verdict: Some(verdict.clone()),
        };
        state.append_capped(keys::SECURITY_LOG, &record, SECURITY_LOG_CAP);

        match action {
            AuditAction::Allowed => state.increment(keys::SECURITY_COUNTERS, "allowed"),
            _ => state.increment(keys::SECURITY_COUNTERS, "blocked"),
        }
        if verdict.severity == Severity::Warning {
            state.increment(keys::SECURITY_COUNTERS, "warnings");
        }

        if !verdict.valid {
            warn!(
                "🚫 Blocked {} for '{}': {}",
                operation,
                verdict.target,
                verdict.issues.join("; ")
            );
        }
    }

    fn record_query(
        &self,
        state: &SessionState,
        timestamp: DateTime<Utc>,
        query: &str,
        issues: &[String],
        action: AuditAction,
    ) {
        let record = QueryAuditRecord {
            timestamp,
            operation: "validate_query".to_string(),
            query: truncate_chars(query, MAX_QUERY_LEN),
            issues: issues.to_vec(),
            action,
        };
        state.append_capped(keys::QUERY_LOG, &record, QUERY_LOG_CAP);
    }
}

/// Number of log entries whose timestamp falls inside the window ending at
/// `now`. The current request is not yet in the log when this runs, so a
/// count at the limit means the request would exceed it.
pub(crate) fn queries_in_window(
    entries: &[QueryAuditRecord],
    now: DateTime<Utc>,
    window: Duration,
) -> usize {
    entries
        .iter()
        .filter(|entry| {
            let age = now.signed_duration_since(entry.timestamp);
            age >= Duration::zero() && age < window
        })
        .count()
}

/// Lexically resolve `path` against `root` and check containment. The
/// target may not exist yet, so the joined path is normalized component by
/// component instead of canonicalized.
fn resolves_within_root(root: &Path, path: &str) -> bool {
    let joined = root.join(path);
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    resolved.starts_with(root)
}

fn compile_patterns(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).map_err(VestigeError::from))
        .collect()
}
