// vtrace - Loop-aware execution trace capture
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::Command,
    time::timeout,
};
use tracing::{debug, warn};
use vtrace_common::types::TraceLog;

use super::{
    FinishedStatus, GuestMessage, RunContext, RunRequest, StepControl, StepObserver,
    TraceRecorder, HARNESS_SOURCE,
};

/// Interpreter used when none is configured
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Reason reported when the harness gives none for a guest error
const UNKNOWN_GUEST_ERROR: &str = "unknown guest error";

/// Settings shared by every run of a sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Interpreter executable running the harness
    pub interpreter: PathBuf,
    /// Maximum number of captured steps per run
    pub step_budget: usize,
    /// Also trace frames of functions defined inside the subject
    pub trace_nested_definitions: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            step_budget: 3000,
            trace_nested_definitions: false,
        }
    }
}

/// Terminal status of one sandbox run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunStatus {
    /// The guest ran to completion
    Completed,
    /// The step budget was reached and the guest was aborted
    BudgetExceeded,
    /// The wall-clock deadline elapsed and the guest was aborted
    TimedOut,
    /// The guest raised; the payload describes the exception
    GuestError(String),
    /// The sandbox itself failed (spawn, pipe or protocol failure)
    SandboxFault(String),
}

impl RunStatus {
    /// Short machine-friendly name of the status
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::BudgetExceeded => "budget_exceeded",
            Self::TimedOut => "timed_out",
            Self::GuestError(_) => "guest_error",
            Self::SandboxFault(_) => "sandbox_fault",
        }
    }

    /// Whether the guest ran to completion
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GuestError(reason) | Self::SandboxFault(reason) => {
                write!(f, "{}: {reason}", self.label())
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// Trace Log and terminal status of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutcome {
    /// Snapshots collected before the run ended, possibly none
    pub log: TraceLog,
    /// How the run ended
    pub status: RunStatus,
}

/// Failures of the sandbox machinery; reported as [`RunStatus::SandboxFault`]
#[derive(Debug, Error)]
pub(crate) enum SandboxError {
    /// The per-run working directory could not be created
    #[error("failed to create working directory: {0}")]
    Workdir(io::Error),

    /// The interpreter could not be started
    #[error("failed to spawn interpreter {interpreter}: {source}")]
    Spawn {
        /// Interpreter that failed to start
        interpreter: String,
        /// Underlying I/O error
        source: io::Error,
    },

    /// A child pipe was not available
    #[error("child {0} pipe is not available")]
    MissingPipe(&'static str),

    /// The run request could not be encoded
    #[error("failed to encode run request: {0}")]
    Request(#[from] serde_json::Error),

    /// Reading from or writing to the child failed
    #[error("pipe I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The harness stopped streaming without a terminal message
    #[error("harness exited without a terminal message ({0})")]
    Truncated(String),
}

/// Instrumented execution sandbox.
///
/// Every run spawns a fresh interpreter process in its own temporary working
/// directory, so concurrent runs share nothing. Runs never fail: a Trace Log
/// (possibly empty) and an explicit [`RunStatus`] are always returned.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    /// Create a sandbox from configuration
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// The sandbox configuration
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `source` over `inputs` and record its Trace Log
    pub async fn run(&self, source: &str, inputs: &[String], ctx: &RunContext) -> SandboxOutcome {
        let mut recorder = TraceRecorder::new(self.config.step_budget);
        let status = self.run_with_observer(source, inputs, ctx, &mut recorder).await;
        SandboxOutcome { log: recorder.into_log(), status }
    }

    /// Run `source` over `inputs`, streaming every step into `observer`.
    ///
    /// An observer halting the run is reported as
    /// [`RunStatus::BudgetExceeded`]. The wall-clock timer is installed only
    /// when `ctx` owns its deadline.
    pub async fn run_with_observer<O>(
        &self,
        source: &str,
        inputs: &[String],
        ctx: &RunContext,
        observer: &mut O,
    ) -> RunStatus
    where
        O: StepObserver,
    {
        let started = Instant::now();

        let workdir = match tempfile::Builder::new().prefix("vtrace-run-").tempdir() {
            Ok(dir) => dir,
            Err(error) => return RunStatus::SandboxFault(SandboxError::Workdir(error).to_string()),
        };

        let pump = self.pump(source, inputs, workdir.path(), observer);
        let result = match ctx.deadline.owned_limit() {
            Some(limit) => match timeout(limit, pump).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(%ctx, ?limit, "Deadline elapsed, guest aborted");
                    Ok(RunStatus::TimedOut)
                }
            },
            None => pump.await,
        };

        let status = result.unwrap_or_else(|error| {
            warn!(%ctx, %error, "Sandbox fault");
            RunStatus::SandboxFault(error.to_string())
        });
        debug!(%ctx, %status, elapsed = ?started.elapsed(), "Sandbox run finished");
        status
    }

    /// Spawn the harness and dispatch its step stream until it ends
    async fn pump<O>(
        &self,
        source: &str,
        inputs: &[String],
        workdir: &Path,
        observer: &mut O,
    ) -> Result<RunStatus, SandboxError>
    where
        O: StepObserver,
    {
        // Dropping the child (deadline elapsed) kills it
        let mut child = Command::new(&self.config.interpreter)
            .args(["-I", "-c", HARNESS_SOURCE])
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                interpreter: self.config.interpreter.display().to_string(),
                source,
            })?;

        let request = serde_json::to_vec(&RunRequest {
            source,
            inputs,
            step_budget: self.config.step_budget,
            trace_nested: self.config.trace_nested_definitions,
        })?;

        let mut stdin = child.stdin.take().ok_or(SandboxError::MissingPipe("stdin"))?;
        stdin.write_all(&request).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let stdout = child.stdout.take().ok_or(SandboxError::MissingPipe("stdout"))?;
        let mut lines = BufReader::new(stdout).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message = match GuestMessage::decode(line) {
                Ok(message) => message,
                Err(error) => {
                    warn!(%error, line, "Skipping malformed harness message");
                    continue;
                }
            };

            match message {
                GuestMessage::Finished { status, reason } => {
                    if let Err(error) = child.wait().await {
                        debug!(%error, "Failed to reap harness process");
                    }
                    return Ok(match status {
                        FinishedStatus::Completed => RunStatus::Completed,
                        FinishedStatus::Budget => RunStatus::BudgetExceeded,
                        FinishedStatus::Error => RunStatus::GuestError(
                            reason.unwrap_or_else(|| UNKNOWN_GUEST_ERROR.to_string()),
                        ),
                    });
                }
                step => {
                    let Some(snapshot) = step.into_snapshot() else { continue };
                    if observer.observe(snapshot) == StepControl::Halt {
                        debug!("Observer halted the run");
                        if let Err(error) = child.kill().await {
                            warn!(%error, "Failed to kill harness process");
                        }
                        return Ok(RunStatus::BudgetExceeded);
                    }
                }
            }
        }

        let exit = child.wait().await?;
        Err(SandboxError::Truncated(exit.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::{fs, os::unix::fs::PermissionsExt, time::Duration};
    use tempfile::TempDir;
    use vtrace_common::ensure_test_logging;

    use crate::sandbox::Deadline;

    /// Install a fake interpreter that ignores its arguments and runs `body`
    fn fake_interpreter(body: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-python");
        fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    }

    fn sandbox(interpreter: PathBuf, step_budget: usize) -> Sandbox {
        Sandbox::new(SandboxConfig { interpreter, step_budget, trace_nested_definitions: false })
    }

    const STEP: &str =
        r#"{"type":"step","order":1,"event":"line","function":"f","line":1,"locals":{}}"#;

    #[tokio::test]
    #[serial]
    async fn test_observer_halt_caps_the_log() {
        ensure_test_logging(None);
        let body = format!(
            "i=0\nwhile [ $i -lt 10 ]; do echo '{STEP}'; i=$((i+1)); done\necho '{}'",
            r#"{"type":"finished","status":"completed"}"#
        );
        let (_dir, interpreter) = fake_interpreter(&body);

        let outcome = sandbox(interpreter, 3).run("", &[], &RunContext::default()).await;

        assert_eq!(outcome.status, RunStatus::BudgetExceeded);
        assert_eq!(outcome.log.len(), 3);
    }

    #[tokio::test]
    #[serial]
    async fn test_malformed_lines_are_skipped() {
        ensure_test_logging(None);
        let body = format!(
            "echo 'garbage'\necho '{STEP}'\necho '{}'",
            r#"{"type":"finished","status":"error","reason":"ValueError: boom"}"#
        );
        let (_dir, interpreter) = fake_interpreter(&body);

        let outcome = sandbox(interpreter, 10).run("", &[], &RunContext::default()).await;

        assert_eq!(outcome.status, RunStatus::GuestError("ValueError: boom".to_string()));
        assert_eq!(outcome.log.len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_terminal_message_is_a_fault() {
        ensure_test_logging(None);
        let (_dir, interpreter) = fake_interpreter(&format!("echo '{STEP}'"));

        let outcome = sandbox(interpreter, 10).run("", &[], &RunContext::default()).await;

        assert!(matches!(outcome.status, RunStatus::SandboxFault(_)));
        assert_eq!(outcome.log.len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_owned_deadline_times_out() {
        ensure_test_logging(None);
        let (_dir, interpreter) = fake_interpreter(&format!("echo '{STEP}'\nsleep 5"));
        let ctx = RunContext::default().with_deadline(Deadline::Owned(Duration::from_millis(300)));

        let started = Instant::now();
        let outcome = sandbox(interpreter, 10).run("", &[], &ctx).await;

        assert_eq!(outcome.status, RunStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(outcome.log.len() <= 1);
    }

    #[tokio::test]
    async fn test_unknown_interpreter_is_a_fault() {
        ensure_test_logging(None);
        let interpreter = PathBuf::from("/nonexistent/vtrace-python");

        let outcome = sandbox(interpreter, 10).run("x = 1", &[], &RunContext::default()).await;

        match outcome.status {
            RunStatus::SandboxFault(reason) => assert!(reason.contains("spawn")),
            other => panic!("expected a sandbox fault, got {other:?}"),
        }
        assert!(outcome.log.is_empty());
    }

    #[test]
    fn test_status_wire_format() {
        let value = serde_json::to_value(RunStatus::GuestError("EOFError".to_string())).unwrap();
        assert_eq!(value, serde_json::json!({"status": "guest_error", "reason": "EOFError"}));

        let value = serde_json::to_value(RunStatus::TimedOut).unwrap();
        assert_eq!(value, serde_json::json!({"status": "timed_out"}));
    }
}
