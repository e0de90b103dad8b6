// Path policy tests: traversal and system-path blocking, workspace
// containment, sensitive-extension warnings, and the audit trail every
// decision leaves behind.

use tempfile::TempDir;

use crate::errors::VestigeError;
use crate::gate::{AuditAction, AuditRecord, SecurityGate, Severity};
use crate::session::{SessionState, keys};
use crate::tests::helpers::temp_workspace;

fn gate_over_temp_workspace() -> (TempDir, SecurityGate) {
    let (temp, workspace) = temp_workspace();
    let gate = SecurityGate::new(&workspace.root, &workspace.config)
        .expect("Failed to build security gate");
    (temp, gate)
}

/// Test: traversal sequences are blocked no matter how they are written
#[test]
fn test_traversal_paths_are_blocked() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    for path in ["../secrets.txt", "../../etc/passwd", "src/../../other/file.py"] {
        let verdict = gate.validate_path(&session, path);
        assert!(!verdict.valid, "{} should be blocked", path);
        assert_eq!(verdict.severity, Severity::Error);
        assert!(!verdict.issues.is_empty());
    }
}

/// Test: absolute system locations are blocked even without traversal
#[test]
fn test_system_paths_are_blocked() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    for path in ["/etc/passwd", "/usr/lib/libc.so", "/proc/self/environ", "~/.ssh/id_rsa"] {
        let verdict = gate.validate_path(&session, path);
        assert!(!verdict.valid, "{} should be blocked", path);
        assert!(
            verdict
                .issues
                .iter()
                .any(|i| i.contains("Dangerous path pattern")),
            "{} should name the matched pattern, got {:?}",
            path,
            verdict.issues
        );
    }
}

/// Test: a clean-looking path outside the workspace is still blocked
///
/// Containment is checked by resolving the path, not by pattern matching,
/// so an absolute path into some unrelated directory fails even though it
/// matches no denylist entry.
#[test]
fn test_paths_outside_the_workspace_are_blocked() {
    let (_temp, gate) = gate_over_temp_workspace();
    let elsewhere = TempDir::new().expect("Failed to create second temp directory");
    let session = SessionState::new();

    let outside = elsewhere.path().join("notes.py");
    let verdict = gate.validate_path(&session, &outside.to_string_lossy());

    assert!(!verdict.valid);
    assert!(
        verdict
            .issues
            .iter()
            .any(|i| i.contains("outside project directory")),
        "got {:?}",
        verdict.issues
    );
}

/// Test: ordinary relative paths pass cleanly
#[test]
fn test_relative_paths_inside_the_workspace_pass() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    // The target does not need to exist; screening is lexical.
    for path in ["src/auth.py", "docs/guide.md", "deeply/nested/module.ts"] {
        let verdict = gate.validate_path(&session, path);
        assert!(verdict.valid, "{} should pass", path);
        assert_eq!(verdict.severity, Severity::Info);
        assert!(verdict.issues.is_empty());
    }
}

/// Test: sensitive extensions warn without blocking
#[test]
fn test_sensitive_extensions_warn_but_pass() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    let verdict = gate.validate_path(&session, "deploy/production.env");
    assert!(verdict.valid);
    assert_eq!(verdict.severity, Severity::Warning);
    assert!(
        verdict.issues.iter().any(|i| i.contains(".env")),
        "got {:?}",
        verdict.issues
    );

    let counters = session.counters(keys::SECURITY_COUNTERS);
    assert_eq!(counters.get("allowed"), Some(&1));
    assert_eq!(counters.get("warnings"), Some(&1));
}

/// Test: authorize_path turns a blocking verdict into a terminal error
#[test]
fn test_authorize_path_enforces_the_verdict() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    let allowed = gate.authorize_path(&session, "src/auth.py");
    assert!(allowed.is_ok());

    let blocked = gate.authorize_path(&session, "../../etc/passwd");
    match blocked {
        Err(VestigeError::BoundaryViolation { target, issues }) => {
            assert!(target.contains("etc/passwd"));
            assert!(!issues.is_empty());
        }
        other => panic!("expected BoundaryViolation, got {:?}", other.map(|v| v.valid)),
    }
}

/// Test: every decision lands in the audit log with its action
#[test]
fn test_decisions_are_audited() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    gate.validate_path(&session, "src/auth.py");
    gate.validate_path(&session, "/etc/passwd");

    let log: Vec<AuditRecord> = session.get(keys::SECURITY_LOG).expect("audit log should exist");
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].operation, "validate_path");
    assert_eq!(log[0].action, AuditAction::Allowed);
    assert_eq!(log[1].action, AuditAction::Blocked);
    assert!(log[1].verdict.as_ref().is_some_and(|v| !v.valid));

    let counters = session.counters(keys::SECURITY_COUNTERS);
    assert_eq!(counters.get("allowed"), Some(&1));
    assert_eq!(counters.get("blocked"), Some(&1));
}

/// Test: the audit log is bounded
#[test]
fn test_audit_log_is_capped_at_one_hundred_entries() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    for i in 0..105 {
        gate.validate_path(&session, &format!("src/file_{}.py", i));
    }

    let log: Vec<AuditRecord> = session.get(keys::SECURITY_LOG).expect("audit log should exist");
    assert_eq!(log.len(), 100);
    // The oldest entries were evicted, so the first record is request 5.
    assert!(log[0].target.contains("file_5"));
}

/// Test: the summary surfaces counters and recent activity
#[test]
fn test_security_summary_reflects_recent_activity() {
    let (_temp, gate) = gate_over_temp_workspace();
    let session = SessionState::new();

    for i in 0..12 {
        gate.validate_path(&session, &format!("src/file_{}.py", i));
    }
    gate.validate_path(&session, "../escape.py");

    let summary = SecurityGate::security_summary(&session);
    assert_eq!(summary.counters.get("allowed"), Some(&12));
    assert_eq!(summary.counters.get("blocked"), Some(&1));
    assert_eq!(summary.recent_log.len(), 10, "summary shows the last ten decisions");
    assert_eq!(
        summary.recent_log.last().map(|r| r.action),
        Some(AuditAction::Blocked)
    );
}
