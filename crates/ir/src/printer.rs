//! Source text emission.

use crate::node::{Node, NodeKind, Statement};
use crate::tree::SourceTree;
use std::fmt::Write;

const INDENT: &str = "    ";

/// Print a whole compilation unit.
pub fn render_tree(tree: &SourceTree) -> String {
    let mut text = String::new();
    for child in tree.root().children() {
        write_node(&mut text, child, 0);
    }
    text
}

/// Print a single node and its subtree without leading indentation.
pub fn render_node(node: &Node) -> String {
    let mut text = String::new();
    write_node(&mut text, node, 0);
    text.trim_end().to_string()
}

/// Print a detached fragment.
pub fn render_statement(statement: &Statement) -> String {
    let mut text = String::new();
    write_statement(&mut text, statement, 0);
    text.trim_end().to_string()
}

fn write_node(text: &mut String, node: &Node, depth: usize) {
    match &node.kind {
        NodeKind::Simple(line) => {
            let _ = writeln!(text, "{}{}", INDENT.repeat(depth), line);
        }
        NodeKind::Block { header, children } => {
            open_block(text, header, depth);
            for child in children {
                write_node(text, child, depth + 1);
            }
            let _ = writeln!(text, "{}}}", INDENT.repeat(depth));
        }
    }
}

fn write_statement(text: &mut String, statement: &Statement, depth: usize) {
    match statement {
        Statement::Simple(line) => {
            let _ = writeln!(text, "{}{}", INDENT.repeat(depth), line);
        }
        Statement::Block { header, body } => {
            open_block(text, header, depth);
            for child in body {
                write_statement(text, child, depth + 1);
            }
            let _ = writeln!(text, "{}}}", INDENT.repeat(depth));
        }
    }
}

fn open_block(text: &mut String, header: &str, depth: usize) {
    if header.is_empty() {
        let _ = writeln!(text, "{}{{", INDENT.repeat(depth));
    } else {
        let _ = writeln!(text, "{}{} {{", INDENT.repeat(depth), header);
    }
}
