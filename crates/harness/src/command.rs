//! Shell-command harness.
//!
//! Writes the candidate source into a working directory, runs a compile
//! command and then one test command per test. Commands are run through
//! `sh -c` with `{class}`, `{test}` and `{source}` substituted.

use crate::energy::{EnergySampler, NullSampler};
use crate::harness::{TestHarness, UnitTest};
use crate::measure::Probe;
use crate::result::{FitnessResult, TestOutcome};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHarnessConfig {
    /// Directory the commands run in.
    pub workdir: PathBuf,
    /// Path of the target source file, relative to `workdir`.
    pub source_file: PathBuf,
    pub compile_command: String,
    pub test_command: String,
    /// Exit code a test command uses to report a skipped test.
    #[serde(default)]
    pub skip_exit_code: Option<i32>,
    /// Per-command time limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CommandHarnessConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.compile_command.trim().is_empty() {
            return Err("compile command must not be empty".into());
        }
        if self.test_command.trim().is_empty() {
            return Err("test command must not be empty".into());
        }
        if self.source_file.is_absolute() {
            return Err("source file must be relative to the working directory".into());
        }
        if self.timeout_secs == Some(0) {
            return Err("timeout must be > 0".into());
        }
        Ok(())
    }

    pub fn source_path(&self) -> PathBuf {
        self.workdir.join(&self.source_file)
    }
}

struct ShellOutput {
    code: Option<i32>,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

impl ShellOutput {
    fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Stderr followed by stdout, trimmed.
    fn combined(&self) -> String {
        let mut text = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stdout);
        }
        text
    }
}

pub struct CommandHarness {
    config: CommandHarnessConfig,
    sampler: Box<dyn EnergySampler>,
}

impl CommandHarness {
    pub fn new(config: CommandHarnessConfig) -> Self {
        Self {
            config,
            sampler: Box::new(NullSampler),
        }
    }

    pub fn with_sampler(mut self, sampler: Box<dyn EnergySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn config(&self) -> &CommandHarnessConfig {
        &self.config
    }

    /// Overwrite the target file with `source`.
    pub fn write_source(&self, source: &str) -> Result<()> {
        let path = self.config.source_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, source)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    fn expand(&self, template: &str, class_name: &str, test: Option<&str>) -> String {
        let source = self.config.source_file.to_string_lossy();
        let mut command = template
            .replace("{class}", class_name)
            .replace("{source}", &source);
        if let Some(test) = test {
            command = command.replace("{test}", test);
        }
        command
    }

    fn run_shell(&self, command: &str) -> Result<ShellOutput> {
        debug!(command, "running");
        let mut shell = Command::new("sh");
        shell
            .arg("-c")
            .arg(command)
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timeout reaches everything the shell started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            shell.process_group(0);
        }
        let mut child = shell
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", command))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let (code, timed_out) = wait(&mut child, self.config.timeout_secs)?;

        Ok(ShellOutput {
            code,
            stdout: stdout.join().map_err(|_| anyhow!("stdout reader panicked"))?,
            stderr: stderr.join().map_err(|_| anyhow!("stderr reader panicked"))?,
            timed_out,
        })
    }

    fn compile(&self, class_name: &str) -> Result<Option<String>> {
        let command = self.expand(&self.config.compile_command, class_name, None);
        let output = self.run_shell(&command)?;
        if output.success() {
            return Ok(None);
        }
        let mut diagnostic = output.combined();
        if output.timed_out {
            diagnostic = format!("compilation timed out\n{}", diagnostic);
        }
        Ok(Some(diagnostic.trim().to_string()))
    }

    fn run_test(&self, class_name: &str, test: &UnitTest) -> Result<TestOutcome> {
        let command = self.expand(&self.config.test_command, class_name, Some(&test.name));
        let probe = Probe::start(self.sampler.as_ref());
        let output = self.run_shell(&command)?;
        let metrics = probe.finish();

        if output.success() {
            return Ok(TestOutcome::passed(&test.name, metrics));
        }
        if output.timed_out {
            let limit = self.config.timeout_secs.unwrap_or_default();
            return Ok(TestOutcome::failed(
                &test.name,
                format!("{} timed out after {}s", test.name, limit),
                metrics,
            ));
        }
        if output.code.is_some() && output.code == self.config.skip_exit_code {
            debug!(test = %test.name, "skipped");
            return Ok(TestOutcome::skipped(&test.name, metrics));
        }

        let mut exception = output.combined();
        if exception.is_empty() {
            exception = match output.code {
                Some(code) => format!("{} exited with status {}", test.name, code),
                None => format!("{} terminated by signal", test.name),
            };
        }
        Ok(TestOutcome::failed(&test.name, exception, metrics))
    }
}

impl TestHarness for CommandHarness {
    fn run(&self, class_name: &str, source: &str, tests: &[UnitTest]) -> Result<FitnessResult> {
        let start = Instant::now();
        self.write_source(source)?;

        if let Some(diagnostic) = self.compile(class_name)? {
            debug!(class = class_name, "compilation failed");
            return Ok(FitnessResult::compile_failure(diagnostic).with_source(source));
        }

        let mut outcomes = Vec::with_capacity(tests.len());
        for test in tests {
            outcomes.push(self.run_test(class_name, test)?);
        }

        let result = FitnessResult::from_tests(outcomes).with_source(source);
        info!(
            class = class_name,
            tests = tests.len(),
            outcome = %result.outcome(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "candidate evaluated"
        );
        Ok(result)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Wait for the child, killing it once the limit passes.
fn wait(child: &mut Child, timeout_secs: Option<u64>) -> Result<(Option<i32>, bool)> {
    let Some(secs) = timeout_secs else {
        let status = child.wait().context("failed to wait for child")?;
        return Ok((status.code(), false));
    };

    let deadline = Instant::now() + Duration::from_secs(secs);
    loop {
        if let Some(status) = child.try_wait().context("failed to poll child")? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            let status = child.wait().context("failed to reap child")?;
            return Ok((status.code(), true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child and every process in its group.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // SAFETY: killpg only signals; the group id is the child's own pid.
    let rc = unsafe { libc::killpg(child.id() as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid = child.id(), "killpg failed, killing the shell only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}
