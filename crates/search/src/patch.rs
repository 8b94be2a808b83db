//! Ordered edit sequences.

use crate::edit::Edit;
use patchforge_ir::{SourceTree, TreeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Edits applied left to right to a baseline tree.
///
/// `Clone` is a deep copy: edits own all their data, so a cloned patch can be
/// extended or simplified without affecting the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    edits: Vec<Edit>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn add(&mut self, edit: impl Into<Edit>) {
        self.edits.push(edit.into());
    }

    /// Remove the edit at `index`, or `None` when out of range.
    pub fn remove(&mut self, index: usize) -> Option<Edit> {
        if index < self.edits.len() {
            Some(self.edits.remove(index))
        } else {
            None
        }
    }

    /// Fold every edit over `tree`. The first structural mismatch aborts.
    pub fn apply(&self, tree: &SourceTree) -> Result<SourceTree, TreeError> {
        self.edits
            .iter()
            .try_fold(tree.clone(), |current, edit| edit.apply(&current))
    }

    pub fn describe(&self) -> String {
        if self.edits.is_empty() {
            return "<empty patch>".into();
        }
        self.edits
            .iter()
            .map(Edit::describe)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl FromIterator<Edit> for Patch {
    fn from_iter<I: IntoIterator<Item = Edit>>(iter: I) -> Self {
        Self {
            edits: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::StructuralEdit;
    use patchforge_ir::BraceParser;

    fn tree() -> SourceTree {
        SourceTree::parse("class K { void run() { a(); b(); c(); } }", &BraceParser)
            .unwrap()
            .focus_method("run")
            .unwrap()
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let t = tree();
        assert_eq!(Patch::new().apply(&t).unwrap().render(), t.render());
        assert_eq!(Patch::new().describe(), "<empty patch>");
    }

    #[test]
    fn test_edits_apply_in_order() {
        let t = tree();
        let mut patch = Patch::new();
        patch.add(StructuralEdit::Delete { target: 3 });
        // Target already removed by the first edit.
        patch.add(StructuralEdit::Delete { target: 3 });
        patch.add(StructuralEdit::Delete { target: 5 });

        let out = patch.apply(&t).unwrap();
        assert!(!out.render().contains("a();"));
        assert!(out.render().contains("b();"));
        assert!(!out.render().contains("c();"));
        assert_eq!(patch.describe(), "delete 3 | delete 3 | delete 5");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = Patch::new();
        original.add(StructuralEdit::Delete { target: 3 });

        let mut copy = original.clone();
        copy.add(StructuralEdit::Delete { target: 4 });
        assert_eq!(copy.remove(0), Some(Edit::Structural(StructuralEdit::Delete { target: 3 })));

        assert_eq!(original.len(), 1);
        assert_eq!(
            original.edits()[0],
            Edit::Structural(StructuralEdit::Delete { target: 3 })
        );
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut patch = Patch::new();
        assert_eq!(patch.remove(0), None);
    }

    #[test]
    fn test_mismatch_propagates() {
        let mut patch = Patch::new();
        patch.add(StructuralEdit::Delete { target: 2 });
        assert!(matches!(
            patch.apply(&tree()),
            Err(TreeError::StructuralMismatch { .. })
        ));
    }
}
