//! Shadow Workspace Validator - Edits Proven Safe Before They Land
//!
//! Evaluates a proposed file-content change inside an ephemeral copy of the
//! minimal project context, so diagnostics run against the edited code
//! without the real tree ever changing. The temporary directory lives for
//! exactly one validation and is removed on every exit path, including
//! backend failure and timeout.

pub mod syntax;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::errors::{Result, VestigeError};
use crate::gate::SecurityGate;
use crate::session::{SessionState, keys};
use crate::workspace::VestigeWorkspace;

const VALIDATION_LOG_CAP: usize = 50;
const CODE_VALIDATIONS_CAP: usize = 20;
const RECENT_OPERATIONS: usize = 10;
const RECENT_VALIDATIONS: usize = 5;

/// Severity of one diagnostic finding, following the LSP numeric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

impl DiagnosticSeverity {
    /// Map the LSP wire value (1 = error, 2 = warning, 3 = information,
    /// 4 = hint). Anything else lands on `Hint` so an unknown severity can
    /// never fail a validation.
    pub fn from_lsp(value: u8) -> Self {
        match value {
            1 => DiagnosticSeverity::Error,
            2 => DiagnosticSeverity::Warning,
            3 => DiagnosticSeverity::Information,
            _ => DiagnosticSeverity::Hint,
        }
    }

    pub fn as_lsp(&self) -> u8 {
        match self {
            DiagnosticSeverity::Error => 1,
            DiagnosticSeverity::Warning => 2,
            DiagnosticSeverity::Information => 3,
            DiagnosticSeverity::Hint => 4,
        }
    }
}

/// One structured finding from the diagnostic backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line the finding points at.
    pub line: u32,
    /// 0-based column within that line.
    pub column: u32,
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// Identifier of the analyzer that produced the finding.
    pub source: String,
}

/// Diagnostic backend the validator drives.
///
/// Implementations analyze `content` as if it were the contents of
/// `file_path` inside `workspace_root` and report findings. An `Err` return
/// is a backend failure, which the validator surfaces as a distinct
/// outcome; it is never read as a clean result.
pub trait DiagnosticProvider: Send + Sync {
    /// Identifier recorded on findings and in logs.
    fn name(&self) -> &str;

    fn diagnose(
        &self,
        file_path: &Path,
        content: &str,
        workspace_root: &Path,
    ) -> Result<Vec<Finding>>;
}

/// Outcome of one shadow validation.
#[derive(Debug, Clone, Serialize)]
pub struct ShadowValidationResult {
    /// True exactly when no error-severity finding was reported.
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub diagnostics: Vec<Finding>,
    /// Where the shadow copy lived. Informational only; the directory is
    /// gone by the time the caller sees this.
    pub shadow_workspace: PathBuf,
}

/// One entry in the validation operations log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub file_path: String,
    pub success: bool,
    pub details: String,
}

/// Per-file digest of the latest diagnostic run, keyed by path in the
/// session's `file_diagnostics` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiagnostics {
    pub timestamp: DateTime<Utc>,
    pub diagnostics: Vec<Finding>,
    pub error_count: usize,
    pub warning_count: usize,
}

/// One completed validation, kept in the session's bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub timestamp: DateTime<Utc>,
    pub file_path: String,
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Read model over the session's validation bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub counters: HashMap<String, u64>,
    pub recent_operations: Vec<ValidationLogEntry>,
    pub file_diagnostics: HashMap<String, FileDiagnostics>,
    pub code_validations: Vec<ValidationRecord>,
}

/// Validates proposed edits inside a throwaway workspace copy.
///
/// Each call builds its own temporary directory, so concurrent validations
/// never share state. The diagnostic backend runs on its own thread under a
/// call-level timeout; a hung analyzer cannot stall the caller.
pub struct ShadowValidator {
    root: PathBuf,
    context_files: Vec<String>,
    timeout: Duration,
    provider: Arc<dyn DiagnosticProvider>,
}

impl ShadowValidator {
    pub fn new(workspace: &VestigeWorkspace, provider: Arc<dyn DiagnosticProvider>) -> Self {
        Self {
            root: workspace.root.clone(),
            context_files: workspace.config.context_files.clone(),
            timeout: Duration::from_secs(workspace.config.diagnostic_timeout_secs),
            provider,
        }
    }

    /// Validate `proposed_content` as the new contents of `file_path`.
    ///
    /// The path must clear the security gate first; a blocked path never
    /// reaches the filesystem. Content findings are warnings and recorded,
    /// so validation proceeds past them.
    pub fn validate(
        &self,
        session: &SessionState,
        gate: &SecurityGate,
        file_path: &str,
        proposed_content: &str,
    ) -> Result<ShadowValidationResult> {
        gate.authorize_path(session, file_path)?;
        gate.validate_content(session, proposed_content);

        debug!("Preparing shadow workspace for {}", file_path);
        let shadow = TempDir::new()?;
        self.populate_shadow(shadow.path(), file_path);

        let target = shadow.path().join(file_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, proposed_content)?;

        let findings = match self.run_diagnostics(shadow.path(), file_path, proposed_content) {
            Ok(findings) => findings,
            Err(e) => {
                self.log_operation(session, "validations", file_path, false, &e.to_string());
                warn!("Shadow validation of {} failed: {}", file_path, e);
                return Err(e);
            }
        };

        let error_count = count_severity(&findings, DiagnosticSeverity::Error);
        let warning_count = count_severity(&findings, DiagnosticSeverity::Warning);

        let mut diagnostics_by_file: HashMap<String, FileDiagnostics> =
            session.get(keys::FILE_DIAGNOSTICS).unwrap_or_default();
        diagnostics_by_file.insert(
            file_path.to_string(),
            FileDiagnostics {
                timestamp: Utc::now(),
                diagnostics: findings.clone(),
                error_count,
                warning_count,
            },
        );
        session.set(keys::FILE_DIAGNOSTICS, &diagnostics_by_file);
        self.log_operation(
            session,
            "diagnostics",
            file_path,
            true,
            &format!("Found {} issues", findings.len()),
        );

        let valid = error_count == 0;
        session.append_capped(
            keys::CODE_VALIDATIONS,
            &ValidationRecord {
                timestamp: Utc::now(),
                file_path: file_path.to_string(),
                valid,
                error_count,
                warning_count,
            },
            CODE_VALIDATIONS_CAP,
        );
        self.log_operation(
            session,
            "validations",
            file_path,
            true,
            &format!("Validation: {} errors, {} warnings", error_count, warning_count),
        );

        if valid {
            info!(
                "Shadow validation passed for {} ({} warnings)",
                file_path, warning_count
            );
        } else {
            warn!(
                "Shadow validation failed for {}: {} errors, {} warnings",
                file_path, error_count, warning_count
            );
        }

        Ok(ShadowValidationResult {
            valid,
            error_count,
            warning_count,
            diagnostics: findings,
            shadow_workspace: shadow.path().to_path_buf(),
        })
    }

    /// Summary of this session's validation activity
    pub fn validation_summary(session: &SessionState) -> ValidationSummary {
        ValidationSummary {
            counters: session.counters(keys::VALIDATION_COUNTERS),
            recent_operations: session.tail_as(keys::VALIDATION_LOG, RECENT_OPERATIONS),
            file_diagnostics: session.get(keys::FILE_DIAGNOSTICS).unwrap_or_default(),
            code_validations: session.tail_as(keys::CODE_VALIDATIONS, RECENT_VALIDATIONS),
        }
    }

    /// Copy the minimal diagnostic context into the shadow directory: the
    /// current on-disk version of the target file when it exists, plus the
    /// project manifests. Everything here is best-effort; a file that
    /// cannot be copied is skipped, since the proposed content is written
    /// over the target afterwards anyway.
    fn populate_shadow(&self, shadow_root: &Path, file_path: &str) {
        let source = self.root.join(file_path);
        if source.is_file() {
            let dest = shadow_root.join(file_path);
            let prepared = match dest.parent() {
                Some(parent) => fs::create_dir_all(parent),
                None => Ok(()),
            };
            if let Err(e) = prepared.and_then(|_| fs::copy(&source, &dest).map(|_| ())) {
                debug!("Could not copy {} into shadow workspace: {}", file_path, e);
            }
        }

        for manifest in &self.context_files {
            let source = self.root.join(manifest);
            if !source.is_file() {
                continue;
            }
            if let Err(e) = fs::copy(&source, shadow_root.join(manifest)) {
                debug!("Could not copy manifest {} into shadow workspace: {}", manifest, e);
            }
        }
    }

    /// Run the diagnostic backend on its own thread so it can be abandoned
    /// at the timeout. A timed-out or crashed backend is a failure outcome,
    /// never an empty diagnostic list.
    fn run_diagnostics(
        &self,
        shadow_root: &Path,
        file_path: &str,
        content: &str,
    ) -> Result<Vec<Finding>> {
        let (tx, rx) = mpsc::channel();
        let provider = Arc::clone(&self.provider);
        let path = PathBuf::from(file_path);
        let content = content.to_string();
        let root = shadow_root.to_path_buf();

        thread::spawn(move || {
            let outcome = provider.diagnose(&path, &content, &root);
            let _ = tx.send(outcome);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(findings)) => Ok(findings),
            Ok(Err(e)) => Err(VestigeError::DiagnosticFailure(format!(
                "Diagnostic backend '{}' failed: {}",
                self.provider.name(),
                e
            ))),
            Err(RecvTimeoutError::Timeout) => Err(VestigeError::DiagnosticFailure(format!(
                "Diagnostic backend '{}' timed out after {}s",
                self.provider.name(),
                self.timeout.as_secs()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(VestigeError::DiagnosticFailure(format!(
                "Diagnostic backend '{}' terminated without a result",
                self.provider.name()
            ))),
        }
    }

    fn log_operation(
        &self,
        session: &SessionState,
        operation: &str,
        file_path: &str,
        success: bool,
        details: &str,
    ) {
        session.append_capped(
            keys::VALIDATION_LOG,
            &ValidationLogEntry {
                timestamp: Utc::now(),
                operation: operation.to_string(),
                file_path: file_path.to_string(),
                success,
                details: details.to_string(),
            },
            VALIDATION_LOG_CAP,
        );
        if success {
            session.increment(keys::VALIDATION_COUNTERS, operation);
        }
    }
}

fn count_severity(findings: &[Finding], severity: DiagnosticSeverity) -> usize {
    findings.iter().filter(|f| f.severity == severity).count()
}
