//! Persistent statement tree.
//!
//! Every mutating operation returns a new [`SourceTree`]; the receiver is left
//! untouched. Only the path from the root to the edited node is rebuilt, every
//! other subtree is shared with the previous version.

use crate::node::{declares_method, is_type_header, BlockId, Node, NodeKind, NodeRole, Statement};
use crate::parser::{ParseError, StatementParser};
use crate::printer;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} not found")]
    NotFound(BlockId),

    #[error("node {id} cannot be rewritten as a statement: {reason}")]
    StructuralMismatch { id: BlockId, reason: String },

    #[error("method `{0}` not found")]
    MethodNotFound(String),
}

impl TreeError {
    fn mismatch(id: BlockId, reason: impl Into<String>) -> Self {
        TreeError::StructuralMismatch {
            id,
            reason: reason.into(),
        }
    }
}

enum Splice {
    Replace(Vec<Arc<Node>>),
    Remove,
    InsertBefore(Vec<Arc<Node>>),
}

#[derive(Debug, Clone)]
pub struct SourceTree {
    root: Arc<Node>,
    next_id: BlockId,
    target_method: Option<BlockId>,
}

impl SourceTree {
    /// Parse a compilation unit.
    pub fn parse(source: &str, parser: &dyn StatementParser) -> Result<Self, ParseError> {
        Ok(Self::from_items(parser.parse_unit(source)?))
    }

    /// Build a tree from top-level items, assigning ids in pre-order.
    pub fn from_items(items: Vec<Statement>) -> Self {
        let mut next_id = 1;
        let children = items
            .iter()
            .map(|item| attach(item, NodeRole::Member, &mut next_id))
            .collect();
        let root = Arc::new(Node {
            id: 0,
            role: NodeRole::Member,
            kind: NodeKind::Block {
                header: String::new(),
                children,
            },
        });
        Self {
            root,
            next_id,
            target_method: None,
        }
    }

    /// Restrict random addressing to the body of the method called `name`.
    pub fn focus_method(mut self, name: &str) -> Result<Self, TreeError> {
        let mut found = None;
        self.root.walk(&mut |node| {
            if found.is_none() && node.role == NodeRole::Member {
                if let Some(header) = node.header() {
                    if declares_method(header, name) {
                        found = Some(node.id);
                    }
                }
            }
        });
        let id = found.ok_or_else(|| TreeError::MethodNotFound(name.to_string()))?;
        debug!(method = name, block = id, "focused target method");
        self.target_method = Some(id);
        Ok(self)
    }

    pub fn target_method(&self) -> Option<BlockId> {
        self.target_method
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn node(&self, id: BlockId) -> Option<&Arc<Node>> {
        self.root.find(id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.node(id).is_some()
    }

    /// Textual form of one node, as it would be printed.
    pub fn node_text(&self, id: BlockId) -> Option<String> {
        self.node(id).map(|node| printer::render_node(node))
    }

    /// Number of nodes, root excluded.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.root.walk(&mut |_| count += 1);
        count - 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.children().is_empty()
    }

    /// Ids of all statement nodes, optionally only those inside the target
    /// method. Falls back to the whole tree when no method is focused.
    pub fn statement_ids(&self, restrict_to_method: bool) -> Vec<BlockId> {
        let scope = if restrict_to_method {
            self.target_method
                .and_then(|id| self.node(id))
                .unwrap_or(&self.root)
        } else {
            &self.root
        };
        let mut ids = Vec::new();
        scope.walk(&mut |node| {
            if node.is_statement() {
                ids.push(node.id);
            }
        });
        ids
    }

    /// Uniformly random statement id, or `None` when there are no statements
    /// in scope.
    pub fn random_block_id(
        &self,
        restrict_to_method: bool,
        rng: &mut fastrand::Rng,
    ) -> Option<BlockId> {
        let ids = self.statement_ids(restrict_to_method);
        if ids.is_empty() {
            None
        } else {
            Some(ids[rng.usize(..ids.len())])
        }
    }

    /// Whether `descendant` lies strictly inside `ancestor`.
    pub fn is_ancestor(&self, ancestor: BlockId, descendant: BlockId) -> bool {
        ancestor != descendant
            && self
                .node(ancestor)
                .map_or(false, |node| node.find(descendant).is_some())
    }

    pub fn replace_node(&self, id: BlockId, replacement: &Statement) -> Result<Self, TreeError> {
        self.check_statement(id)?;
        let mut next_id = self.next_id;
        let fresh = attach(replacement, NodeRole::Statement, &mut next_id);
        self.splice(id, Splice::Replace(vec![fresh]), next_id)
    }

    pub fn remove_node(&self, id: BlockId) -> Result<Self, TreeError> {
        self.check_statement(id)?;
        self.splice(id, Splice::Remove, self.next_id)
    }

    pub fn insert_before(&self, id: BlockId, statement: &Statement) -> Result<Self, TreeError> {
        self.check_statement(id)?;
        let mut next_id = self.next_id;
        let fresh = attach(statement, NodeRole::Statement, &mut next_id);
        self.splice(id, Splice::InsertBefore(vec![fresh]), next_id)
    }

    pub fn render(&self) -> String {
        printer::render_tree(self)
    }

    fn check_statement(&self, id: BlockId) -> Result<(), TreeError> {
        let node = self.node(id).ok_or(TreeError::NotFound(id))?;
        if node.role != NodeRole::Statement {
            return Err(TreeError::mismatch(id, "target is a member declaration"));
        }
        Ok(())
    }

    fn splice(&self, id: BlockId, splice: Splice, next_id: BlockId) -> Result<Self, TreeError> {
        let root = rebuild(&self.root, id, &splice).ok_or(TreeError::NotFound(id))?;
        Ok(Self {
            root,
            next_id,
            target_method: self.target_method,
        })
    }
}

fn attach(statement: &Statement, role: NodeRole, next_id: &mut BlockId) -> Arc<Node> {
    let id = *next_id;
    *next_id += 1;
    let kind = match statement {
        Statement::Simple(text) => NodeKind::Simple(text.clone()),
        Statement::Block { header, body } => {
            let child_role = match role {
                NodeRole::Statement => NodeRole::Statement,
                NodeRole::Member if is_type_header(header) => NodeRole::Member,
                NodeRole::Member => NodeRole::Statement,
            };
            NodeKind::Block {
                header: header.clone(),
                children: body
                    .iter()
                    .map(|child| attach(child, child_role, next_id))
                    .collect(),
            }
        }
    };
    Arc::new(Node { id, role, kind })
}

fn rebuild(node: &Arc<Node>, target: BlockId, splice: &Splice) -> Option<Arc<Node>> {
    let NodeKind::Block { header, children } = &node.kind else {
        return None;
    };

    let children = if let Some(pos) = children.iter().position(|child| child.id == target) {
        let mut next = children.clone();
        match splice {
            Splice::Replace(nodes) => {
                next.splice(pos..=pos, nodes.iter().cloned());
            }
            Splice::Remove => {
                next.remove(pos);
            }
            Splice::InsertBefore(nodes) => {
                next.splice(pos..pos, nodes.iter().cloned());
            }
        }
        next
    } else {
        let (index, rebuilt) = children
            .iter()
            .enumerate()
            .find_map(|(index, child)| rebuild(child, target, splice).map(|n| (index, n)))?;
        let mut next = children.clone();
        next[index] = rebuilt;
        next
    };

    Some(Arc::new(Node {
        id: node.id,
        role: node.role,
        kind: NodeKind::Block {
            header: header.clone(),
            children,
        },
    }))
}
