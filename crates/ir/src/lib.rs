//! PatchForge intermediate representation.
//!
//! Programs are held as a persistent tree of statements. Every node carries a
//! stable [`BlockId`]; edits produce new tree versions that share untouched
//! subtrees with their parent version.

pub mod node;
pub mod parser;
pub mod printer;
pub mod tree;

pub use node::*;
pub use parser::*;
pub use printer::*;
pub use tree::*;
