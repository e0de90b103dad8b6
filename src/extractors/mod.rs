// Extractors Module
//
// Turns source text into the CodeElement model the index stores. One
// extractor per indexed language, all built on the same tree-sitter
// traversal idiom. Files without extractable declarations fall back to a
// single module-kind element spanning the whole file, so every indexed
// file has at least one element behind its summary.

pub mod javascript;
pub mod markdown;
pub mod python;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::errors::Result;
use crate::utils::truncate_chars;

/// Stored source excerpt length per element, in characters.
const CONTENT_EXCERPT_LEN: usize = 400;

/// Closed kind set for indexed code elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Function,
    Class,
    Module,
    Other,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Function => "function",
            ElementKind::Class => "class",
            ElementKind::Module => "module",
            ElementKind::Other => "other",
        }
    }

    pub fn from_str_or_other(s: &str) -> Self {
        match s {
            "function" => ElementKind::Function,
            "class" => ElementKind::Class,
            "module" => ElementKind::Module,
            _ => ElementKind::Other,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One indexed code element.
///
/// Immutable once created: a re-index of unchanged source produces a new
/// element under the same id, which supersedes this one wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeElement {
    /// Stable id, md5 over path, name, and position.
    pub id: String,
    pub name: String,
    pub kind: ElementKind,
    /// Workspace-relative path with forward slashes.
    pub file_path: String,
    /// 1-based, inclusive.
    pub start_line: u32,
    pub end_line: u32,
    /// Docstring or section body when the language carries one.
    pub doc_comment: Option<String>,
    /// Source excerpt used for previews and embedding input.
    pub content: String,
    /// Embedding vector, populated during indexing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

/// Aggregate file-level view over the elements extracted from one file.
/// Exists exactly when at least one element exists for the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_path: String,
    pub file_type: String,
    pub element_count: usize,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl FileSummary {
    /// Compose the file-level summary text from the file's elements: the
    /// first documented element's doc line, then a kind/name listing.
    pub fn compose(file_path: &str, elements: &[CodeElement]) -> Self {
        let mut summary = String::new();
        if let Some(doc) = elements.iter().find_map(|e| e.doc_comment.as_deref()) {
            summary.push_str(doc.lines().next().unwrap_or_default().trim());
        }
        if !summary.is_empty() && !summary.ends_with('.') {
            summary.push('.');
        }
        if !summary.is_empty() {
            summary.push(' ');
        }

        let listing: Vec<String> = elements
            .iter()
            .map(|e| format!("{} {}", e.kind, e.name))
            .collect();
        let noun = if elements.len() == 1 {
            "element"
        } else {
            "elements"
        };
        summary.push_str(&format!(
            "{} file with {} {}: {}",
            file_type_of(file_path),
            elements.len(),
            noun,
            listing.join(", ")
        ));

        Self {
            file_path: file_path.to_string(),
            file_type: file_type_of(file_path).to_string(),
            element_count: elements.len(),
            summary: truncate_chars(&summary, CONTENT_EXCERPT_LEN),
            embedding: Vec::new(),
        }
    }
}

/// Extract the indexable elements of one file. `file_path` is stored on
/// every element verbatim, so callers pass workspace-relative paths.
pub fn extract_elements(file_path: &str, content: &str) -> Result<Vec<CodeElement>> {
    let extension = Path::new(file_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let mut elements = match extension.as_deref() {
        Some("py") => python::extract(file_path, content)?,
        Some("js") | Some("jsx") => {
            javascript::extract(file_path, content, javascript::Dialect::JavaScript)?
        }
        Some("ts") => javascript::extract(file_path, content, javascript::Dialect::TypeScript)?,
        Some("tsx") => javascript::extract(file_path, content, javascript::Dialect::Tsx)?,
        Some("md") => markdown::extract(file_path, content)?,
        _ => Vec::new(),
    };

    if elements.is_empty() {
        elements.push(whole_file_element(file_path, content));
    }
    Ok(elements)
}

/// Language category for a file, derived from its extension.
pub fn file_type_of(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("py") => "python",
        Some("js") | Some("jsx") => "javascript",
        Some("ts") | Some("tsx") => "typescript",
        Some("md") => "markdown",
        _ => "other",
    }
}

/// True when `path`'s file type satisfies `filter`. The filter may name a
/// language ("python") or an extension ("py", ".py").
pub fn matches_file_type(path: &str, filter: &str) -> bool {
    let filter = filter.trim_start_matches('.').to_lowercase();
    if file_type_of(path) == filter {
        return true;
    }
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase() == filter)
        .unwrap_or(false)
}

pub(crate) fn generate_id(
    file_path: &str,
    name: &str,
    start_line: u32,
    start_column: u32,
) -> String {
    let id_string = format!("{}:{}:{}:{}", file_path, name, start_line, start_column);
    format!("{:x}", md5::compute(id_string.as_bytes()))
}

fn whole_file_element(file_path: &str, content: &str) -> CodeElement {
    let name = Path::new(file_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_path)
        .to_string();
    let end_line = content.lines().count().max(1) as u32;

    CodeElement {
        id: generate_id(file_path, &name, 1, 0),
        name,
        kind: ElementKind::Module,
        file_path: file_path.to_string(),
        start_line: 1,
        end_line,
        doc_comment: None,
        content: truncate_chars(content, CONTENT_EXCERPT_LEN),
        embedding: Vec::new(),
    }
}

/// Shared state and helpers for the per-language extractors.
pub(crate) struct ExtractorBase {
    pub file_path: String,
    pub content: String,
}

impl ExtractorBase {
    pub fn new(file_path: String, content: String) -> Self {
        Self { file_path, content }
    }

    pub fn get_node_text(&self, node: &Node) -> String {
        self.content[node.byte_range()].to_string()
    }

    /// Build an element for `node`. Lines are converted to 1-based here;
    /// tree-sitter rows are 0-based.
    pub fn create_element(
        &self,
        node: &Node,
        name: String,
        kind: ElementKind,
        doc_comment: Option<String>,
    ) -> CodeElement {
        let start = node.start_position();
        let end = node.end_position();
        let start_line = start.row as u32 + 1;

        CodeElement {
            id: generate_id(&self.file_path, &name, start_line, start.column as u32),
            name,
            kind,
            file_path: self.file_path.clone(),
            start_line,
            end_line: end.row as u32 + 1,
            doc_comment,
            content: truncate_chars(&self.get_node_text(node), CONTENT_EXCERPT_LEN),
            embedding: Vec::new(),
        }
    }
}
