// Shared test infrastructure: disposable workspaces, fixture source files,
// and scripted stand-ins for the external collaborators (diagnostic
// backends, the embedder) so no test needs a language server or a model.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::embeddings::TextEmbedder;
use crate::errors::{Result, VestigeError};
use crate::shadow::{DiagnosticProvider, DiagnosticSeverity, Finding};
use crate::workspace::VestigeWorkspace;

/// Initialize a workspace inside a fresh temporary directory.
///
/// The TempDir must be kept alive for the duration of the test; dropping it
/// deletes the workspace out from under the component being tested.
pub fn temp_workspace() -> (TempDir, VestigeWorkspace) {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let root = temp
        .path()
        .canonicalize()
        .expect("Failed to canonicalize temp root");
    let workspace = VestigeWorkspace::initialize(root).expect("Failed to initialize workspace");
    (temp, workspace)
}

/// Write `content` at `relative` under `root`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(&path, content).expect("Failed to write fixture file");
}

/// A small project with one Python file, one JavaScript file, and a README.
///
/// Identifiers are snake_case on purpose: the hash embedder tokenizes on
/// non-alphanumeric boundaries, so multi-word names stay searchable by
/// their words.
pub fn python_project() -> (TempDir, VestigeWorkspace) {
    let (temp, workspace) = temp_workspace();

    write_file(
        &workspace.root,
        "src/auth.py",
        r#"def validate_credentials(username, password):
    """check a username and password pair against the user store"""
    return username == "admin" and password == "hunter2"


def hash_password(password):
    """derive a salted hash for a password"""
    return "salted:" + password
"#,
    );
    write_file(
        &workspace.root,
        "src/render.js",
        "function render_svg_chart(data) {\n  return data.length;\n}\n",
    );
    write_file(
        &workspace.root,
        "README.md",
        "# demo fixture\n\nsmall project used by the indexing tests.\n",
    );

    (temp, workspace)
}

/// Relative paths of the files `python_project` creates, in scan order.
pub fn python_project_files() -> Vec<String> {
    vec![
        "README.md".to_string(),
        "src/auth.py".to_string(),
        "src/render.js".to_string(),
    ]
}

/// Shorthand for building a finding in a scripted backend.
pub fn finding(line: u32, severity: DiagnosticSeverity, message: &str) -> Finding {
    Finding {
        line,
        column: 0,
        severity,
        message: message.to_string(),
        source: "scripted".to_string(),
    }
}

/// Diagnostic backend that replays a fixed list of findings.
pub struct ScriptedDiagnostics {
    findings: Vec<Finding>,
}

impl ScriptedDiagnostics {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self { findings }
    }

    pub fn clean() -> Self {
        Self::new(Vec::new())
    }
}

impl DiagnosticProvider for ScriptedDiagnostics {
    fn name(&self) -> &str {
        "scripted"
    }

    fn diagnose(&self, _file: &Path, _content: &str, _root: &Path) -> Result<Vec<Finding>> {
        Ok(self.findings.clone())
    }
}

/// Diagnostic backend that always fails.
pub struct FailingDiagnostics;

impl DiagnosticProvider for FailingDiagnostics {
    fn name(&self) -> &str {
        "failing"
    }

    fn diagnose(&self, _file: &Path, _content: &str, _root: &Path) -> Result<Vec<Finding>> {
        Err(VestigeError::DiagnosticFailure(
            "analyzer crashed".to_string(),
        ))
    }
}

/// Diagnostic backend that sleeps past the configured timeout.
pub struct SlowDiagnostics {
    pub delay: Duration,
}

impl DiagnosticProvider for SlowDiagnostics {
    fn name(&self) -> &str {
        "slow"
    }

    fn diagnose(&self, _file: &Path, _content: &str, _root: &Path) -> Result<Vec<Finding>> {
        thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

/// Embedder that errors on every call.
///
/// Still reports a real dimensionality, so an index persisted by a working
/// embedder hydrates; only producing new vectors is broken.
pub struct FailingEmbedder {
    pub dimensions: usize,
}

impl TextEmbedder for FailingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(VestigeError::IoError(std::io::Error::other(
            "embedding backend offline",
        )))
    }
}
