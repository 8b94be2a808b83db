//! Edits: single transformations of one tree version into the next.
//!
//! Applying an edit never mutates its input. An edit whose address is no
//! longer present in the tree (it was replaced or deleted by an earlier edit)
//! is the identity.

use patchforge_ir::{render_statement, BlockId, SourceTree, Statement, TreeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of structural edit the mutator can draw from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Delete,
    Copy,
    Replace,
    Swap,
    Move,
}

impl EditKind {
    pub const ALL: [EditKind; 5] = [
        EditKind::Delete,
        EditKind::Copy,
        EditKind::Replace,
        EditKind::Swap,
        EditKind::Move,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Delete => "delete",
            EditKind::Copy => "copy",
            EditKind::Replace => "replace",
            EditKind::Swap => "swap",
            EditKind::Move => "move",
        }
    }
}

impl FromStr for EditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EditKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown edit kind: {}", s))
    }
}

/// A statement rewrite proposed by the generation backend.
///
/// `replacement` is `None` when the response contained no usable code; such
/// an edit applies as the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReplacement {
    pub destination: BlockId,
    pub replacement: Option<Statement>,
    /// Fenced block the replacement was parsed from.
    pub replacement_text: String,
    pub prompt: String,
    pub response: String,
}

impl GeneratedReplacement {
    pub fn no_suggestion(
        destination: BlockId,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            destination,
            replacement: None,
            replacement_text: String::new(),
            prompt: prompt.into(),
            response: response.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.replacement.is_none()
    }

    pub fn apply(&self, tree: &SourceTree) -> Result<SourceTree, TreeError> {
        let Some(replacement) = &self.replacement else {
            return Ok(tree.clone());
        };
        if !tree.contains(self.destination) {
            return Ok(tree.clone());
        }
        if is_empty_statement(replacement) {
            return Err(TreeError::StructuralMismatch {
                id: self.destination,
                reason: "replacement is empty".into(),
            });
        }
        tree.replace_node(self.destination, replacement)
    }

    pub fn describe(&self) -> String {
        match &self.replacement {
            None => format!("llm-replace {} -> (no suggestion)", self.destination),
            Some(statement) => format!(
                "llm-replace {} -> {}",
                self.destination,
                one_line(&render_statement(statement))
            ),
        }
    }
}

/// Random statement-level edits over existing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralEdit {
    Delete { target: BlockId },
    /// Insert a copy of `source` before `destination`.
    Copy { source: BlockId, destination: BlockId },
    /// Overwrite `destination` with a copy of `source`.
    Replace { source: BlockId, destination: BlockId },
    Swap { first: BlockId, second: BlockId },
    /// Copy `source` before `destination`, then delete `source`.
    Move { source: BlockId, destination: BlockId },
}

impl StructuralEdit {
    /// Draw an edit of `kind` with addresses inside the target method.
    pub fn random(kind: EditKind, tree: &SourceTree, rng: &mut fastrand::Rng) -> Option<Self> {
        let first = tree.random_block_id(true, rng)?;
        let edit = match kind {
            EditKind::Delete => StructuralEdit::Delete { target: first },
            EditKind::Copy => StructuralEdit::Copy {
                source: first,
                destination: tree.random_block_id(true, rng)?,
            },
            EditKind::Replace => StructuralEdit::Replace {
                source: first,
                destination: tree.random_block_id(true, rng)?,
            },
            EditKind::Swap => StructuralEdit::Swap {
                first,
                second: tree.random_block_id(true, rng)?,
            },
            EditKind::Move => StructuralEdit::Move {
                source: first,
                destination: tree.random_block_id(true, rng)?,
            },
        };
        Some(edit)
    }

    pub fn kind(&self) -> EditKind {
        match self {
            StructuralEdit::Delete { .. } => EditKind::Delete,
            StructuralEdit::Copy { .. } => EditKind::Copy,
            StructuralEdit::Replace { .. } => EditKind::Replace,
            StructuralEdit::Swap { .. } => EditKind::Swap,
            StructuralEdit::Move { .. } => EditKind::Move,
        }
    }

    pub fn apply(&self, tree: &SourceTree) -> Result<SourceTree, TreeError> {
        match *self {
            StructuralEdit::Delete { target } => {
                if !tree.contains(target) {
                    return Ok(tree.clone());
                }
                tree.remove_node(target)
            }
            StructuralEdit::Copy {
                source,
                destination,
            } => match (statement_at(tree, source)?, tree.contains(destination)) {
                (Some(copy), true) => tree.insert_before(destination, &copy),
                _ => Ok(tree.clone()),
            },
            StructuralEdit::Replace {
                source,
                destination,
            } => {
                if source == destination {
                    return Ok(tree.clone());
                }
                match (statement_at(tree, source)?, tree.contains(destination)) {
                    (Some(copy), true) => tree.replace_node(destination, &copy),
                    _ => Ok(tree.clone()),
                }
            }
            StructuralEdit::Swap { first, second } => {
                if first == second {
                    return Ok(tree.clone());
                }
                let (Some(a), Some(b)) = (statement_at(tree, first)?, statement_at(tree, second)?)
                else {
                    return Ok(tree.clone());
                };
                if tree.is_ancestor(first, second) || tree.is_ancestor(second, first) {
                    return Err(TreeError::StructuralMismatch {
                        id: first,
                        reason: format!("cannot swap with nested node {}", second),
                    });
                }
                tree.replace_node(first, &b)?.replace_node(second, &a)
            }
            StructuralEdit::Move {
                source,
                destination,
            } => {
                if source == destination {
                    return Ok(tree.clone());
                }
                let Some(moved) = statement_at(tree, source)? else {
                    return Ok(tree.clone());
                };
                if !tree.contains(destination) {
                    return Ok(tree.clone());
                }
                if tree.is_ancestor(source, destination) {
                    return Err(TreeError::StructuralMismatch {
                        id: source,
                        reason: format!("cannot move into own descendant {}", destination),
                    });
                }
                tree.insert_before(destination, &moved)?.remove_node(source)
            }
        }
    }

    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StructuralEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralEdit::Delete { target } => write!(f, "delete {}", target),
            StructuralEdit::Copy {
                source,
                destination,
            } => write!(f, "copy {} -> before {}", source, destination),
            StructuralEdit::Replace {
                source,
                destination,
            } => write!(f, "replace {} with {}", destination, source),
            StructuralEdit::Swap { first, second } => write!(f, "swap {} <-> {}", first, second),
            StructuralEdit::Move {
                source,
                destination,
            } => write!(f, "move {} -> before {}", source, destination),
        }
    }
}

/// One edit of a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edit {
    Generated(GeneratedReplacement),
    Structural(StructuralEdit),
}

impl Edit {
    pub fn apply(&self, tree: &SourceTree) -> Result<SourceTree, TreeError> {
        match self {
            Edit::Generated(edit) => edit.apply(tree),
            Edit::Structural(edit) => edit.apply(tree),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Edit::Generated(edit) => edit.describe(),
            Edit::Structural(edit) => edit.describe(),
        }
    }
}

impl From<GeneratedReplacement> for Edit {
    fn from(edit: GeneratedReplacement) -> Self {
        Edit::Generated(edit)
    }
}

impl From<StructuralEdit> for Edit {
    fn from(edit: StructuralEdit) -> Self {
        Edit::Structural(edit)
    }
}

/// Detached copy of the statement at `id`. `None` when the id is gone;
/// member declarations cannot be used as statements.
fn statement_at(tree: &SourceTree, id: BlockId) -> Result<Option<Statement>, TreeError> {
    match tree.node(id) {
        None => Ok(None),
        Some(node) if !node.is_statement() => Err(TreeError::StructuralMismatch {
            id,
            reason: "source is a member declaration".into(),
        }),
        Some(node) => Ok(Some(node.to_statement())),
    }
}

fn is_empty_statement(statement: &Statement) -> bool {
    match statement {
        Statement::Simple(text) => text.trim().is_empty(),
        Statement::Block { .. } => false,
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
