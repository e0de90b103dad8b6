// Python extractor: functions, classes, and their docstrings.

use tree_sitter::{Node, Parser};

use super::{CodeElement, ElementKind, ExtractorBase};
use crate::errors::{Result, VestigeError};

/// Extract all indexable elements from Python source.
pub fn extract(file_path: &str, content: &str) -> Result<Vec<CodeElement>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| VestigeError::Parse(format!("Failed to set Python language: {}", e)))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| VestigeError::Parse(format!("Failed to parse {}", file_path)))?;

    let extractor = PythonExtractor::new(file_path.to_string(), content.to_string());
    let mut elements = Vec::new();
    extractor.traverse(tree.root_node(), &mut elements);
    Ok(elements)
}

struct PythonExtractor {
    base: ExtractorBase,
}

impl PythonExtractor {
    fn new(file_path: String, content: String) -> Self {
        Self {
            base: ExtractorBase::new(file_path, content),
        }
    }

    fn traverse(&self, node: Node, elements: &mut Vec<CodeElement>) {
        match node.kind() {
            "class_definition" => {
                if let Some(element) = self.extract_class(node) {
                    elements.push(element);
                }
            }
            // Async functions surface as function_definition in current
            // grammars; older ones used a dedicated node kind.
            "function_definition" | "async_function_definition" => {
                if let Some(element) = self.extract_function(node) {
                    elements.push(element);
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.traverse(child, elements);
        }
    }

    fn extract_class(&self, node: Node) -> Option<CodeElement> {
        let name_node = node.child_by_field_name("name")?;
        let name = self.base.get_node_text(&name_node);
        let doc_comment = self.extract_docstring(&node);
        Some(
            self.base
                .create_element(&node, name, ElementKind::Class, doc_comment),
        )
    }

    fn extract_function(&self, node: Node) -> Option<CodeElement> {
        let name_node = node.child_by_field_name("name")?;
        let name = self.base.get_node_text(&name_node);
        let doc_comment = self.extract_docstring(&node);
        Some(
            self.base
                .create_element(&node, name, ElementKind::Function, doc_comment),
        )
    }

    /// Python docstrings are the first string expression inside the body.
    fn extract_docstring(&self, node: &Node) -> Option<String> {
        let body_node = node.child_by_field_name("body")?;

        let mut cursor = body_node.walk();
        for child in body_node.children(&mut cursor) {
            if child.kind() == "expression_statement" {
                let mut expr_cursor = child.walk();
                for expr_child in child.children(&mut expr_cursor) {
                    if expr_child.kind() == "string" {
                        let raw = self.base.get_node_text(&expr_child);
                        return Some(strip_string_delimiters(&raw).trim().to_string());
                    }
                }
            } else if child.kind() == "string" {
                let raw = self.base.get_node_text(&child);
                return Some(strip_string_delimiters(&raw).trim().to_string());
            }
        }

        None
    }
}

/// Remove surrounding quotes: triple quotes first, then single-character
/// delimiters. All delimiters are ASCII so byte slicing is safe.
fn strip_string_delimiters(s: &str) -> String {
    let delimiters = [("\"\"\"", 3), ("'''", 3), ("\"", 1), ("'", 1)];

    for (delimiter, strip_count) in &delimiters {
        if s.starts_with(delimiter) && s.ends_with(delimiter) && s.len() >= strip_count * 2 {
            return s[*strip_count..s.len() - strip_count].to_string();
        }
    }

    s.to_string()
}
