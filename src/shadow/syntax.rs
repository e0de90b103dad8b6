// Built-in diagnostic backend: tree-sitter syntax analysis. Surfaces parse
// errors and missing tokens as error-severity findings, so shadow
// validation works offline without an external language server.

use std::path::Path;

use tree_sitter::{Language, Node, Parser};
use tracing::debug;

use super::{DiagnosticProvider, DiagnosticSeverity, Finding};
use crate::errors::{Result, VestigeError};
use crate::utils::preview_chars;

const EXCERPT_LEN: usize = 40;

/// Syntax-only diagnostic provider.
///
/// Parses the proposed content with the grammar matching the file's
/// extension and reports every error region and missing token the parse
/// tree carries. Extensions without a grammar produce no findings; this
/// backend has nothing to say about them.
#[derive(Debug, Default)]
pub struct SyntaxDiagnostics;

impl SyntaxDiagnostics {
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticProvider for SyntaxDiagnostics {
    fn name(&self) -> &str {
        "syntax"
    }

    fn diagnose(
        &self,
        file_path: &Path,
        content: &str,
        _workspace_root: &Path,
    ) -> Result<Vec<Finding>> {
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        let language = match extension.as_deref().and_then(language_for) {
            Some(language) => language,
            None => {
                debug!("No syntax grammar for {}, skipping", file_path.display());
                return Ok(Vec::new());
            }
        };

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| VestigeError::Parse(format!("Failed to set language: {}", e)))?;
        let tree = parser.parse(content, None).ok_or_else(|| {
            VestigeError::Parse(format!("Failed to parse {}", file_path.display()))
        })?;

        let mut findings = Vec::new();
        collect_errors(tree.root_node(), content, &mut findings);
        Ok(findings)
    }
}

fn language_for(extension: &str) -> Option<Language> {
    match extension {
        "py" => Some(tree_sitter_python::LANGUAGE.into()),
        "js" | "jsx" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "ts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        _ => None,
    }
}

/// Walk the tree collecting ERROR regions and missing tokens. Subtrees
/// without the error flag are skipped; tree-sitter propagates the flag to
/// every ancestor of a problem node.
fn collect_errors(node: Node, content: &str, findings: &mut Vec<Finding>) {
    if !node.has_error() {
        return;
    }

    if node.is_error() {
        let excerpt = content[node.byte_range()]
            .lines()
            .next()
            .unwrap_or_default()
            .trim();
        findings.push(finding_at(
            node,
            if excerpt.is_empty() {
                "Syntax error".to_string()
            } else {
                format!("Syntax error near '{}'", preview_chars(excerpt, EXCERPT_LEN))
            },
        ));
    } else if node.is_missing() {
        findings.push(finding_at(node, format!("Missing '{}'", node.kind())));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_errors(child, content, findings);
    }
}

fn finding_at(node: Node, message: String) -> Finding {
    let start = node.start_position();
    Finding {
        line: start.row as u32 + 1,
        column: start.column as u32,
        severity: DiagnosticSeverity::Error,
        message,
        source: "syntax".to_string(),
    }
}
