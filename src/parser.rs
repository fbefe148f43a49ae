//! Python parsing via tree-sitter.
//!
//! The rest of the crate treats the parser as an external collaborator: it
//! consumes `ParsedFile` values (tree + source + path) and `tree_sitter::Node`
//! views, and never constructs trees itself.

use std::path::Path;

use tree_sitter::{Node, Parser};

/// Holds a parsed tree-sitter tree and associated metadata.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// Project-relative path (used in findings and fingerprints).
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// 1-indexed (line, column) of a node's start.
    pub fn position(&self, node: Node) -> (usize, usize) {
        let start = node.start_position();
        (start.row + 1, start.column + 1)
    }

    /// Name of the nearest enclosing function or class definition, or
    /// `<module>` at top level. Used as the structural context for
    /// fingerprints so they survive line shifts.
    pub fn enclosing_definition(&self, node: Node) -> String {
        let mut current = node.parent();
        while let Some(n) = current {
            if matches!(n.kind(), "function_definition" | "class_definition") {
                if let Some(name) = n.child_by_field_name("name") {
                    return self.node_text(name).to_string();
                }
            }
            current = n.parent();
        }
        "<module>".to_string()
    }
}

/// Parse Python source into a tree.
///
/// Returns an error if the parser produces no tree or the tree contains
/// syntax errors; callers downgrade this to a per-file parse diagnostic.
pub fn parse_python(path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into())?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("failed to parse {}", path.display()))?;

    if tree.root_node().has_error() {
        anyhow::bail!("syntax errors in {}", path.display());
    }

    Ok(ParsedFile {
        tree,
        source: source.to_vec(),
        path: path.to_string_lossy().to_string(),
    })
}
