//! Subprocess execution with timeout enforcement.
//!
//! **What**: Defines [`CommandRunner`], the capability trait depup-core uses
//! to invoke install commands, lock-file regeneration commands, and system
//! test commands, plus a concrete [`TokioCommandRunner`] implementation.
//!
//! **How**: Grounded in the teacher's `command` module (`Executor`,
//! `Command`, `CommandOutput`), trimmed down to single-shot, non-streaming
//! execution: depup-core never needs a command queue or a live output
//! stream, only "run this, wait up to N seconds, give me the result."
//!
//! **Why**: A bounded timeout is mandatory — a hung `npm install` or `cargo
//! generate-lockfile` must not hang a whole update run forever.

use crate::error::{CommandError, CommandResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code, or `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    /// Captured standard output, lossily decoded as UTF-8.
    pub stdout: String,
    /// Captured standard error, lossily decoded as UTF-8.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with status `0`.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Capability trait for running a bounded, non-interactive subprocess.
///
/// Implementations are supplied by the host application, not by this crate's
/// callers directly — depup-core only ever depends on the trait, never on
/// `tokio::process` itself, so a host can substitute a fake runner in tests
/// without touching a single real process.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` in `cwd`, with `env` merged over the
    /// inherited environment, killing the process if it runs past `timeout`.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
        timeout: Duration,
    ) -> CommandResult<CommandOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    /// Creates a new `TokioCommandRunner`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn command_line(program: &str, args: &[String]) -> String {
        if args.is_empty() {
            program.to_string()
        } else {
            format!("{program} {}", args.join(" "))
        }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
        timeout_duration: Duration,
    ) -> CommandResult<CommandOutput> {
        let command_line = Self::command_line(program, args);
        let cwd: PathBuf = cwd.to_path_buf();

        let mut command = TokioCommand::new(program);
        command
            .args(args)
            .current_dir(&cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the `wait_with_output()` future on timeout below must
            // actually terminate the child, not just stop polling it.
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| CommandError::SpawnFailed {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        let wait_result = timeout(timeout_duration, child.wait_with_output()).await;

        let output = match wait_result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CommandError::SpawnFailed {
                    command: command_line,
                    reason: e.to_string(),
                })
            }
            Err(_elapsed) => {
                tracing::warn!(
                    command = %command_line,
                    timeout_secs = timeout_duration.as_secs(),
                    "command timed out and was killed"
                );
                return Err(CommandError::TimedOut {
                    command: command_line,
                    timeout_secs: timeout_duration.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let status = output.status.code();

        if status != Some(0) {
            return Err(CommandError::NonZeroExit {
                command: command_line,
                status: status.unwrap_or(-1),
                stderr,
            });
        }

        Ok(CommandOutput { status, stdout, stderr })
    }
}

#[allow(clippy::unwrap_used)]
#[allow(clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_successful_command() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(
                "true",
                &[],
                Path::new("."),
                &HashMap::new(),
                Duration::from_secs(5),
            )
            .await
            .expect("true should succeed");
        assert!(output.success());
    }

    #[tokio::test]
    async fn reports_non_zero_exit() {
        let runner = TokioCommandRunner::new();
        let err = runner
            .run(
                "false",
                &[],
                Path::new("."),
                &HashMap::new(),
                Duration::from_secs(5),
            )
            .await
            .expect_err("false should fail");
        assert!(matches!(err, CommandError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn reports_timeout() {
        let runner = TokioCommandRunner::new();
        let err = runner
            .run(
                "sleep",
                &["2".to_string()],
                Path::new("."),
                &HashMap::new(),
                Duration::from_millis(50),
            )
            .await
            .expect_err("sleep 2 should exceed a 50ms timeout");
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }
}
