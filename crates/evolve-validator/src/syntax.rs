//! Python syntax trees shared by the scanner and the complexity analyzer.

use evolve_core::{Error, Result};
use tree_sitter::{Node, Parser, Tree};

/// Parses Python source, failing on any syntax error in the tree.
pub(crate) fn parse_python(code: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| Error::ParseFailure {
            message: format!("failed to load python grammar: {e}"),
        })?;

    let tree = parser.parse(code, None).ok_or_else(|| Error::ParseFailure {
        message: "parser produced no tree".to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let position = first_error(root).map_or(root.start_position(), |n| n.start_position());
        return Err(Error::ParseFailure {
            message: format!(
                "invalid syntax at line {}, column {}",
                position.row + 1,
                position.column + 1
            ),
        });
    }

    Ok(tree)
}

fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut found = None;
    walk(root, |node| {
        if found.is_none() && (node.is_error() || node.is_missing()) {
            found = Some(node);
        }
    });
    found
}

/// Visits every node in pre-order.
pub(crate) fn walk<'tree>(root: Node<'tree>, mut visit: impl FnMut(Node<'tree>)) {
    let mut cursor = root.walk();
    loop {
        visit(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Source text of a node.
pub(crate) fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}
