//! Harness trait.

use crate::result::FitnessResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One test case, addressed by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitTest {
    pub name: String,
}

impl UnitTest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Compiles and runs one candidate version of the target class.
///
/// `Err` is reserved for infrastructure failures (I/O, process spawning).
/// Compile errors and failing tests are ordinary results.
pub trait TestHarness {
    fn run(&self, class_name: &str, source: &str, tests: &[UnitTest]) -> Result<FitnessResult>;
}

impl<H: TestHarness + ?Sized> TestHarness for Box<H> {
    fn run(&self, class_name: &str, source: &str, tests: &[UnitTest]) -> Result<FitnessResult> {
        (**self).run(class_name, source, tests)
    }
}

impl<H: TestHarness + ?Sized> TestHarness for &H {
    fn run(&self, class_name: &str, source: &str, tests: &[UnitTest]) -> Result<FitnessResult> {
        (**self).run(class_name, source, tests)
    }
}
