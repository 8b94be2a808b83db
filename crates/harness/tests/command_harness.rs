//! Command harness against real shell commands.

#![cfg(unix)]

use patchforge_harness::{CommandHarness, CommandHarnessConfig, Outcome, TestHarness, UnitTest};
use std::path::Path;
use std::time::{Duration, Instant};

fn config(workdir: &Path, compile: &str, test: &str) -> CommandHarnessConfig {
    CommandHarnessConfig {
        workdir: workdir.to_path_buf(),
        source_file: "src/Triangle.java".into(),
        compile_command: compile.into(),
        test_command: test.into(),
        skip_exit_code: Some(77),
        timeout_secs: None,
    }
}

fn tests(names: &[&str]) -> Vec<UnitTest> {
    names.iter().map(|n| UnitTest::new(*n)).collect()
}

#[test]
fn test_source_is_written_and_tests_pass() {
    let dir = tempfile::tempdir().unwrap();
    let harness = CommandHarness::new(config(dir.path(), "test -f {source}", "true"));

    let result = harness
        .run("Triangle", "class Triangle {}", &tests(&["a", "b"]))
        .unwrap();

    assert_eq!(result.outcome(), Outcome::Success);
    assert_eq!(result.tests.len(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/Triangle.java")).unwrap(),
        "class Triangle {}"
    );
    assert_eq!(result.patched_source.as_deref(), Some("class Triangle {}"));
}

#[test]
fn test_compile_failure_carries_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let harness = CommandHarness::new(config(
        dir.path(),
        "echo 'Triangle.java:3: error: missing return' >&2; exit 1",
        "true",
    ));

    let result = harness.run("Triangle", "class Triangle {", &tests(&["a"])).unwrap();

    assert_eq!(result.outcome(), Outcome::CompileError);
    assert_eq!(
        result.compile_error.as_deref(),
        Some("Triangle.java:3: error: missing return")
    );
    assert!(result.tests.is_empty());
}

#[test]
fn test_failing_test_reports_output() {
    let dir = tempfile::tempdir().unwrap();
    let harness = CommandHarness::new(config(
        dir.path(),
        "true",
        "if [ {test} = bad ]; then echo 'expected 3 but was 4'; exit 1; fi",
    ));

    let result = harness
        .run("Triangle", "class Triangle {}", &tests(&["good", "bad"]))
        .unwrap();

    assert_eq!(result.outcome(), Outcome::TestFailure);
    assert!(result.tests[0].passed);
    assert!(!result.tests[1].passed);
    assert_eq!(result.failure_text(), "expected 3 but was 4");
}

#[test]
fn test_skip_exit_code_counts_as_passed() {
    let dir = tempfile::tempdir().unwrap();
    let harness = CommandHarness::new(config(dir.path(), "true", "exit 77"));

    let result = harness.run("Triangle", "class Triangle {}", &tests(&["a"])).unwrap();

    assert_eq!(result.outcome(), Outcome::Success);
    assert!(result.tests[0].skipped);
}

#[test]
fn test_timeout_fails_the_test() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), "true", "exec sleep 3");
    cfg.timeout_secs = Some(1);
    let harness = CommandHarness::new(cfg);

    let result = harness.run("Triangle", "class Triangle {}", &tests(&["slow"])).unwrap();

    assert_eq!(result.outcome(), Outcome::TestFailure);
    assert_eq!(result.failure_text(), "slow timed out after 1s");
}

#[test]
fn test_timeout_kills_commands_started_by_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), "true", "sleep 6; true");
    cfg.timeout_secs = Some(1);
    let harness = CommandHarness::new(cfg);

    let started = Instant::now();
    let result = harness.run("Triangle", "class Triangle {}", &tests(&["slow"])).unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(result.outcome(), Outcome::TestFailure);
    assert_eq!(result.failure_text(), "slow timed out after 1s");
}

#[test]
fn test_compile_timeout_is_a_compile_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), "sleep 6 && echo done", "true");
    cfg.timeout_secs = Some(1);
    let harness = CommandHarness::new(cfg);

    let started = Instant::now();
    let result = harness.run("Triangle", "class Triangle {}", &tests(&["a"])).unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(result.outcome(), Outcome::CompileError);
    assert_eq!(result.compile_error.as_deref(), Some("compilation timed out"));
}

#[test]
fn test_config_validation() {
    let dir = tempfile::tempdir().unwrap();
    assert!(config(dir.path(), "true", "true").validate().is_ok());
    assert!(config(dir.path(), " ", "true").validate().is_err());

    let mut absolute = config(dir.path(), "true", "true");
    absolute.source_file = "/etc/passwd".into();
    assert!(absolute.validate().is_err());
}
