// Content policy tests: risky constructs and oversized payloads warn and
// get recorded, but content screening never blocks an operation.

use crate::gate::{PolicyWarningRecord, SecurityGate, Severity};
use crate::session::{SessionState, keys};
use crate::tests::helpers::temp_workspace;

/// Test: shell and dynamic-execution constructs are flagged
#[test]
fn test_dangerous_operations_warn() {
    let (_temp, workspace) = temp_workspace();
    let gate = SecurityGate::new(&workspace.root, &workspace.config).expect("gate");
    let session = SessionState::new();

    let content = "import subprocess\nsubprocess.run(['rm', '-rf', '/tmp/x'])\n";
    let verdict = gate.validate_content(&session, content);

    assert!(verdict.valid, "content findings never block");
    assert_eq!(verdict.severity, Severity::Warning);
    assert!(
        verdict.issues.iter().any(|i| i.contains("subprocess")),
        "got {:?}",
        verdict.issues
    );
}

/// Test: matching is case-insensitive
#[test]
fn test_dangerous_operations_match_any_case() {
    let (_temp, workspace) = temp_workspace();
    let gate = SecurityGate::new(&workspace.root, &workspace.config).expect("gate");
    let session = SessionState::new();

    let verdict = gate.validate_content(&session, "RM -RF / && SUDO reboot");
    assert_eq!(verdict.severity, Severity::Warning);
    assert!(verdict.issues.iter().any(|i| i.contains("rm -rf")));
    assert!(verdict.issues.iter().any(|i| i.contains("sudo")));
}

/// Test: clean content passes without leaving a warning record
#[test]
fn test_clean_content_passes_silently() {
    let (_temp, workspace) = temp_workspace();
    let gate = SecurityGate::new(&workspace.root, &workspace.config).expect("gate");
    let session = SessionState::new();

    let verdict = gate.validate_content(&session, "def add(a, b):\n    return a + b\n");

    assert!(verdict.valid);
    assert_eq!(verdict.severity, Severity::Info);
    assert!(verdict.issues.is_empty());
    assert!(!session.contains(keys::SECURITY_WARNINGS));
}

/// Test: payloads over the configured size draw a warning
#[test]
fn test_oversized_content_warns() {
    let (_temp, mut workspace) = temp_workspace();
    workspace.config.max_content_bytes = 2 * 1024 * 1024;
    let gate = SecurityGate::new(&workspace.root, &workspace.config).expect("gate");
    let session = SessionState::new();

    let content = "x".repeat(2 * 1024 * 1024 + 1);
    let verdict = gate.validate_content(&session, &content);

    assert!(verdict.valid);
    assert_eq!(verdict.severity, Severity::Warning);
    assert!(
        verdict.issues.iter().any(|i| i.contains("very large (>2MB)")),
        "got {:?}",
        verdict.issues
    );
}

/// Test: warnings are kept for later review alongside the audit log
#[test]
fn test_warnings_are_recorded_for_review() {
    let (_temp, workspace) = temp_workspace();
    let gate = SecurityGate::new(&workspace.root, &workspace.config).expect("gate");
    let session = SessionState::new();

    gate.validate_content(&session, "eval(payload)");

    let warnings: Vec<PolicyWarningRecord> = session
        .get(keys::SECURITY_WARNINGS)
        .expect("warning should be recorded");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, "content_validation");
    assert!(warnings[0].issues.iter().any(|i| i.contains("eval(")));

    let counters = session.counters(keys::SECURITY_COUNTERS);
    assert_eq!(counters.get("warnings"), Some(&1));
    assert_eq!(counters.get("allowed"), Some(&1), "the operation itself was allowed");
}
