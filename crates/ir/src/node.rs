//! Node and statement definitions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Address of a node in a [`crate::SourceTree`].
///
/// Ids are stable across tree versions: path-copied ancestors keep theirs, and
/// nodes introduced by an edit receive fresh ones. A removed node's id never
/// comes back.
pub type BlockId = usize;

/// Where a node sits in the program.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Type declarations, fields, methods and other class-level items.
    Member,
    /// Anything inside a method body.
    Statement,
}

/// A parsed code fragment that is not yet attached to a tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Statement {
    /// A `;`-terminated statement, whitespace-normalized.
    Simple(String),
    /// A braced construct. An empty header is a bare `{ ... }` block.
    Block { header: String, body: Vec<Statement> },
}

impl Statement {
    pub fn simple<S: Into<String>>(text: S) -> Self {
        Statement::Simple(text.into())
    }

    pub fn block<S: Into<String>>(header: S, body: Vec<Statement>) -> Self {
        Statement::Block {
            header: header.into(),
            body,
        }
    }

    /// Number of statements in this fragment, itself included.
    pub fn size(&self) -> usize {
        match self {
            Statement::Simple(_) => 1,
            Statement::Block { body, .. } => 1 + body.iter().map(Statement::size).sum::<usize>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Simple(String),
    Block {
        header: String,
        children: Vec<Arc<Node>>,
    },
}

/// An immutable tree node. Shared between tree versions through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: BlockId,
    pub role: NodeRole,
    pub kind: NodeKind,
}

impl Node {
    pub fn children(&self) -> &[Arc<Node>] {
        match &self.kind {
            NodeKind::Simple(_) => &[],
            NodeKind::Block { children, .. } => children,
        }
    }

    pub fn header(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Simple(_) => None,
            NodeKind::Block { header, .. } => Some(header),
        }
    }

    pub fn is_statement(&self) -> bool {
        self.role == NodeRole::Statement
    }

    /// Detach this node from its tree, dropping all ids.
    pub fn to_statement(&self) -> Statement {
        match &self.kind {
            NodeKind::Simple(text) => Statement::Simple(text.clone()),
            NodeKind::Block { header, children } => Statement::Block {
                header: header.clone(),
                body: children.iter().map(|child| child.to_statement()).collect(),
            },
        }
    }

    /// Pre-order search for `id` in this subtree.
    pub fn find(self: &Arc<Self>, id: BlockId) -> Option<&Arc<Node>> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Pre-order walk over this subtree.
    pub fn walk<'a>(self: &'a Arc<Self>, visit: &mut dyn FnMut(&'a Arc<Node>)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Headers that open a type body; their children stay at member level.
pub fn is_type_header(header: &str) -> bool {
    const TYPE_KEYWORDS: [&str; 7] = [
        "class",
        "interface",
        "enum",
        "record",
        "struct",
        "namespace",
        "@interface",
    ];
    header
        .split(|c: char| c.is_whitespace() || c == '<')
        .any(|word| TYPE_KEYWORDS.contains(&word))
}

/// Whether `header` declares a method or constructor called `name`.
///
/// `name` may carry a parameter list (`fib(int)`); only the identifier is
/// matched.
pub fn declares_method(header: &str, name: &str) -> bool {
    let ident = name.split('(').next().unwrap_or(name).trim();
    if ident.is_empty() || is_type_header(header) {
        return false;
    }
    let needle = format!("{}(", ident);
    let compact: String = collapse_before_paren(header);
    compact.match_indices(&needle).any(|(pos, _)| {
        compact[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '.'))
    })
}

fn collapse_before_paren(header: &str) -> String {
    // `foo (int x)` and `foo(int x)` should match alike.
    let mut out = String::with_capacity(header.len());
    let mut pending_space = false;
    for c in header.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && c != '(' && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_size() {
        let stmt = Statement::block(
            "if (x > 0)",
            vec![Statement::simple("x--;"), Statement::simple("y++;")],
        );
        assert_eq!(stmt.size(), 3);
    }

    #[test]
    fn test_type_header_detection() {
        assert!(is_type_header("public final class Triangle"));
        assert!(is_type_header("enum Colour"));
        assert!(!is_type_header("public static int classify(int a)"));
    }

    #[test]
    fn test_declares_method() {
        assert!(declares_method("public static int fib(int n)", "fib"));
        assert!(declares_method("static int fib (int n)", "fib(int)"));
        assert!(!declares_method("static int fibonacci(int n)", "fib"));
        assert!(!declares_method("static int myfib(int n)", "fib"));
        assert!(!declares_method("class fib", "fib"));
    }
}
