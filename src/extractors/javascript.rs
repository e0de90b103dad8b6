// JavaScript and TypeScript extractor: functions, classes, methods, and
// function-valued bindings. Both languages share one traversal; only the
// grammar differs per dialect.

use tree_sitter::{Language, Node, Parser};

use super::{CodeElement, ElementKind, ExtractorBase};
use crate::errors::{Result, VestigeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl Dialect {
    fn language(&self) -> Language {
        match self {
            Dialect::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Dialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Dialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Dialect::JavaScript => "JavaScript",
            Dialect::TypeScript => "TypeScript",
            Dialect::Tsx => "TSX",
        }
    }
}

/// Extract all indexable elements from JavaScript or TypeScript source.
pub fn extract(file_path: &str, content: &str, dialect: Dialect) -> Result<Vec<CodeElement>> {
    let mut parser = Parser::new();
    parser.set_language(&dialect.language()).map_err(|e| {
        VestigeError::Parse(format!("Failed to set {} language: {}", dialect.name(), e))
    })?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| VestigeError::Parse(format!("Failed to parse {}", file_path)))?;

    let extractor = JavaScriptExtractor::new(file_path.to_string(), content.to_string());
    let mut elements = Vec::new();
    extractor.traverse(tree.root_node(), &mut elements);
    Ok(elements)
}

struct JavaScriptExtractor {
    base: ExtractorBase,
}

impl JavaScriptExtractor {
    fn new(file_path: String, content: String) -> Self {
        Self {
            base: ExtractorBase::new(file_path, content),
        }
    }

    fn traverse(&self, node: Node, elements: &mut Vec<CodeElement>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(element) = self.named_element(node, ElementKind::Function) {
                    elements.push(element);
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(element) = self.named_element(node, ElementKind::Class) {
                    elements.push(element);
                }
            }
            "method_definition" => {
                if let Some(element) = self.named_element(node, ElementKind::Function) {
                    elements.push(element);
                }
            }
            "variable_declarator" => {
                if let Some(element) = self.extract_function_binding(node) {
                    elements.push(element);
                }
            }
            // TypeScript-only declaration forms.
            "interface_declaration" | "enum_declaration" | "type_alias_declaration" => {
                if let Some(element) = self.named_element(node, ElementKind::Other) {
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

    fn named_element(&self, node: Node, kind: ElementKind) -> Option<CodeElement> {
        let name_node = node.child_by_field_name("name")?;
        let name = self.base.get_node_text(&name_node);
        let doc_comment = self.find_doc_comment(node);
        Some(self.base.create_element(&node, name, kind, doc_comment))
    }

    /// `const f = () => ...` and `const f = function ...` bindings count as
    /// functions; plain value bindings are skipped.
    fn extract_function_binding(&self, node: Node) -> Option<CodeElement> {
        let value = node.child_by_field_name("value")?;
        if !matches!(
            value.kind(),
            "arrow_function" | "function_expression" | "function" | "generator_function"
        ) {
            return None;
        }

        let name_node = node.child_by_field_name("name")?;
        if name_node.kind() != "identifier" {
            return None;
        }
        let name = self.base.get_node_text(&name_node);
        let doc_comment = self.find_doc_comment(node);
        Some(
            self.base
                .create_element(&node, name, ElementKind::Function, doc_comment),
        )
    }

    /// JSDoc block immediately preceding the declaration. Exported and
    /// variable-bound declarations carry their doc on the outer statement.
    fn find_doc_comment(&self, node: Node) -> Option<String> {
        let anchor = doc_anchor(node);
        let prev = anchor.prev_sibling()?;
        if prev.kind() != "comment" {
            return None;
        }
        clean_jsdoc(&self.base.get_node_text(&prev))
    }
}

fn doc_anchor(node: Node) -> Node {
    let mut anchor = node;
    while let Some(parent) = anchor.parent() {
        match parent.kind() {
            "lexical_declaration" | "variable_declaration" | "export_statement" => anchor = parent,
            _ => break,
        }
    }
    anchor
}

/// Strip `/** ... */` framing and leading `*` gutters. Line comments and
/// empty blocks yield nothing.
fn clean_jsdoc(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with("/**") {
        return None;
    }

    let body = trimmed
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .trim();
    let lines: Vec<&str> = body
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
