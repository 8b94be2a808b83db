//! Random structural mutation.

use crate::edit::{Edit, EditKind, StructuralEdit};
use crate::patch::Patch;
use patchforge_ir::SourceTree;
use tracing::debug;

/// Draws structural edits uniformly from a fixed set of kinds.
#[derive(Debug, Clone)]
pub struct Mutator {
    kinds: Vec<EditKind>,
}

impl Default for Mutator {
    fn default() -> Self {
        Self::new(EditKind::ALL.to_vec())
    }
}

impl Mutator {
    /// An empty kind list means every kind.
    pub fn new(kinds: Vec<EditKind>) -> Self {
        let kinds = if kinds.is_empty() {
            EditKind::ALL.to_vec()
        } else {
            kinds
        };
        Self { kinds }
    }

    pub fn kinds(&self) -> &[EditKind] {
        &self.kinds
    }

    /// A random edit addressed inside the target method of `tree`.
    pub fn random_edit(&self, tree: &SourceTree, rng: &mut fastrand::Rng) -> Option<Edit> {
        let kind = self.kinds[rng.usize(..self.kinds.len())];
        StructuralEdit::random(kind, tree, rng).map(Edit::Structural)
    }

    /// Clone `patch` and append one random edit, drawn against the tree the
    /// patch produces from `base`.
    pub fn mutate(&self, patch: &Patch, base: &SourceTree, rng: &mut fastrand::Rng) -> Patch {
        let mut mutant = patch.clone();
        let current = match patch.apply(base) {
            Ok(tree) => tree,
            Err(e) => {
                debug!(error = %e, "mutating an invalid patch, addressing the baseline");
                base.clone()
            }
        };
        if let Some(edit) = self.random_edit(&current, rng) {
            mutant.add(edit);
        }
        mutant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchforge_ir::BraceParser;

    fn tree(source: &str) -> SourceTree {
        SourceTree::parse(source, &BraceParser)
            .unwrap()
            .focus_method("run")
            .unwrap()
    }

    #[test]
    fn test_mutate_appends_one_edit() {
        let base = tree("class K { void run() { a(); b(); } }");
        let mutator = Mutator::new(vec![EditKind::Delete]);
        let mut rng = fastrand::Rng::with_seed(11);

        let original = Patch::new();
        let once = mutator.mutate(&original, &base, &mut rng);
        let twice = mutator.mutate(&once, &base, &mut rng);

        assert!(original.is_empty());
        assert_eq!(once.len(), 1);
        assert_eq!(twice.len(), 2);
        assert!(matches!(
            twice.edits()[0],
            Edit::Structural(StructuralEdit::Delete { .. })
        ));
    }

    #[test]
    fn test_empty_method_adds_nothing() {
        let base = tree("class K { void run() { } }");
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(Mutator::default()
            .mutate(&Patch::new(), &base, &mut rng)
            .is_empty());
    }

    #[test]
    fn test_empty_kinds_means_all() {
        assert_eq!(Mutator::new(Vec::new()).kinds(), &EditKind::ALL);
    }
}
