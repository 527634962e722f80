//! Local process-based capability implementations.
//!
//! Commands, builds, tests, and linters all reduce to "run a shell command
//! in the project directory with a timeout". On expiry the child is killed
//! and the outcome reports `timed_out: true` with exit code -1 — a timeout
//! is feedback for the model, not an internal failure.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use uuid::Uuid;

use taiga_core::types::{BuildOutcome, CommandOutcome, LintViolation};

use crate::capability::{Builder, CapResult, CommandExecutor, LinterRunner, TestRunner};

// ---------------------------------------------------------------------------
// Shared shell plumbing
// ---------------------------------------------------------------------------

struct ProcessOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

async fn drain<R: AsyncReadExt + Unpin>(stream: Option<R>) -> String {
    let mut out = String::new();
    if let Some(mut r) = stream {
        let _ = r.read_to_string(&mut out).await;
    }
    out
}

/// Run `sh -c <command>` in `cwd`, killing the child when `timeout` expires.
async fn run_shell(command: &str, cwd: &Path, timeout: Duration) -> CapResult<ProcessOutput> {
    let mut child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let waited = tokio::time::timeout(timeout, async {
        let (out, errs) = tokio::join!(drain(stdout), drain(stderr));
        let status = child.wait().await;
        (out, errs, status)
    })
    .await;

    match waited {
        Ok((stdout, stderr, status)) => Ok(ProcessOutput {
            exit_code: status?.code().unwrap_or(-1),
            stdout,
            stderr,
            timed_out: false,
        }),
        Err(_) => {
            warn!(command, timeout_secs = timeout.as_secs(), "command timed out, killing");
            let _ = child.kill().await;
            Ok(ProcessOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            })
        }
    }
}

fn combined(output: &ProcessOutput) -> String {
    let mut text = output.stdout.clone();
    if !output.stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&output.stderr);
    }
    text
}

// ---------------------------------------------------------------------------
// CommandExecutor
// ---------------------------------------------------------------------------

/// Runs arbitrary `run_command` actions in the project directory.
pub struct LocalCommandExecutor {
    cwd: PathBuf,
    timeout: Duration,
}

impl LocalCommandExecutor {
    pub fn new(cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CommandExecutor for LocalCommandExecutor {
    async fn run(&self, command: &str) -> CapResult<CommandOutcome> {
        let id = format!("cmd-{}", Uuid::new_v4());
        let output = run_shell(command, &self.cwd, self.timeout).await?;
        info!(
            command_id = %id,
            exit_code = output.exit_code,
            timed_out = output.timed_out,
            "command finished"
        );
        Ok(CommandOutcome {
            command_id: id,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: output.timed_out,
        })
    }
}

// ---------------------------------------------------------------------------
// Builder / TestRunner
// ---------------------------------------------------------------------------

/// Runs a fixed build command (`cargo build`, `make`, …).
pub struct ShellBuilder {
    cwd: PathBuf,
    command: String,
    timeout: Duration,
}

impl ShellBuilder {
    pub fn new(cwd: impl Into<PathBuf>, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Builder for ShellBuilder {
    async fn build(&self, target: Option<&str>) -> CapResult<BuildOutcome> {
        let command = match target {
            Some(t) => format!("{} {}", self.command, t),
            None => self.command.clone(),
        };
        let output = run_shell(&command, &self.cwd, self.timeout).await?;
        Ok(BuildOutcome {
            success: !output.timed_out && output.exit_code == 0,
            exit_code: output.exit_code,
            passed: 0,
            failed: 0,
            output: combined(&output),
            timed_out: output.timed_out,
        })
    }
}

/// Runs a fixed test command and extracts pass/fail counts from its output.
pub struct ShellTestRunner {
    cwd: PathBuf,
    command: String,
    timeout: Duration,
}

impl ShellTestRunner {
    pub fn new(cwd: impl Into<PathBuf>, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            command: command.into(),
            timeout,
        }
    }
}

/// Sum `N passed` / `N failed` pairs across the output (cargo prints one
/// line per test binary).
pub(crate) fn parse_test_counts(output: &str) -> (u32, u32) {
    let mut passed = 0u32;
    let mut failed = 0u32;
    let normalized = output.replace(';', " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if i == 0 {
            continue;
        }
        let count = || tokens[i - 1].parse::<u32>().ok();
        if token.starts_with("passed") {
            passed += count().unwrap_or(0);
        } else if token.starts_with("failed") {
            failed += count().unwrap_or(0);
        }
    }
    (passed, failed)
}

#[async_trait]
impl TestRunner for ShellTestRunner {
    async fn run_tests(&self, target: Option<&str>) -> CapResult<BuildOutcome> {
        let command = match target {
            Some(t) => format!("{} {}", self.command, t),
            None => self.command.clone(),
        };
        let output = run_shell(&command, &self.cwd, self.timeout).await?;
        let text = combined(&output);
        let (passed, failed) = parse_test_counts(&text);
        Ok(BuildOutcome {
            success: !output.timed_out && output.exit_code == 0,
            exit_code: output.exit_code,
            passed,
            failed,
            output: text,
            timed_out: output.timed_out,
        })
    }
}

// ---------------------------------------------------------------------------
// LinterRunner
// ---------------------------------------------------------------------------

/// Runs a fixed lint command and parses `file:line:col: severity: message`
/// findings (clippy/gcc style).
pub struct ShellLinter {
    cwd: PathBuf,
    command: String,
    linter_name: String,
    timeout: Duration,
}

impl ShellLinter {
    pub fn new(
        cwd: impl Into<PathBuf>,
        command: impl Into<String>,
        linter_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            command: command.into(),
            linter_name: linter_name.into(),
            timeout,
        }
    }
}

/// Parse one `path:line:col: severity: message` line; `None` for anything
/// else.
pub(crate) fn parse_lint_line(line: &str, linter: &str) -> Option<LintViolation> {
    let mut parts = line.splitn(4, ':');
    let file = parts.next()?.trim();
    let lineno: u32 = parts.next()?.trim().parse().ok()?;
    let column: u32 = parts.next()?.trim().parse().ok()?;
    let rest = parts.next()?.trim();

    let (severity, message) = match rest.split_once(':') {
        Some((sev, msg)) => (sev.trim().to_string(), msg.trim().to_string()),
        None => ("warning".to_string(), rest.to_string()),
    };
    if file.is_empty() || message.is_empty() {
        return None;
    }
    Some(LintViolation {
        file: file.to_string(),
        line: lineno,
        column,
        rule: String::new(),
        severity,
        message,
        linter: linter.to_string(),
    })
}

#[async_trait]
impl LinterRunner for ShellLinter {
    async fn lint(&self, path: Option<&str>) -> CapResult<Vec<LintViolation>> {
        let command = match path {
            Some(p) => format!("{} {}", self.command, p),
            None => self.command.clone(),
        };
        let output = run_shell(&command, &self.cwd, self.timeout).await?;
        let text = combined(&output);
        Ok(text
            .lines()
            .filter_map(|line| parse_lint_line(line, &self.linter_name))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
