//! Command-line wiring for PatchForge.

pub mod cli;
