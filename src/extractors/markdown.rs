// Markdown extractor: heading sections become module-kind elements so
// documentation participates in semantic search next to code.

use tree_sitter::{Node, Parser};

use super::{CodeElement, ElementKind, ExtractorBase};
use crate::errors::{Result, VestigeError};

/// Extract heading sections from markdown source.
pub fn extract(file_path: &str, content: &str) -> Result<Vec<CodeElement>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_md::LANGUAGE.into())
        .map_err(|e| VestigeError::Parse(format!("Failed to set Markdown language: {}", e)))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| VestigeError::Parse(format!("Failed to parse {}", file_path)))?;

    let extractor = MarkdownExtractor::new(file_path.to_string(), content.to_string());
    let mut elements = Vec::new();
    extractor.traverse(tree.root_node(), &mut elements);
    Ok(elements)
}

struct MarkdownExtractor {
    base: ExtractorBase,
}

impl MarkdownExtractor {
    fn new(file_path: String, content: String) -> Self {
        Self {
            base: ExtractorBase::new(file_path, content),
        }
    }

    fn traverse(&self, node: Node, elements: &mut Vec<CodeElement>) {
        // tree-sitter-md wraps each heading and its content in a section.
        if node.kind() == "section" {
            if let Some(element) = self.extract_section(node) {
                elements.push(element);
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.traverse(child, elements);
        }
    }

    /// A section's element is named by its heading; the direct paragraph
    /// content becomes the doc comment. Nested sections are handled by the
    /// recursion, not here.
    fn extract_section(&self, node: Node) -> Option<CodeElement> {
        let mut heading_node = None;
        let mut section_content = String::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "atx_heading" | "setext_heading" => {
                    if heading_node.is_none() {
                        heading_node = Some(child);
                    }
                }
                "paragraph" => {
                    let para = self.base.get_node_text(&child);
                    if !section_content.is_empty() {
                        section_content.push_str("\n\n");
                    }
                    section_content.push_str(para.trim());
                }
                _ => {}
            }
        }

        let heading = heading_node?;
        let name = self.heading_text(heading)?;
        let doc_comment = if section_content.is_empty() {
            None
        } else {
            Some(section_content)
        };
        Some(
            self.base
                .create_element(&node, name, ElementKind::Module, doc_comment),
        )
    }

    fn heading_text(&self, heading: Node) -> Option<String> {
        let raw = self.base.get_node_text(&heading);
        let text = raw.trim_start_matches('#').trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}
