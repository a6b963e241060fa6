//! External tool invocation
//!
//! The only place a child process is spawned. A non-zero exit is not an
//! error here: some tools chat on stderr even when they succeed, so the
//! caller gets the captured triple and decides. The wall-clock timeout is
//! enforced by killing the child, since none of the NBIS tools have one.

use crate::error::PipelineError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` if the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero exit into a `ToolFailure` carrying stderr
    pub fn require_success(self, tool: &str) -> Result<ToolOutput, PipelineError> {
        if self.success() {
            return Ok(self);
        }
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        Err(PipelineError::ToolFailure {
            tool: tool.to_string(),
            message: status,
            stderr: self.stderr,
        })
    }
}

/// Runs external tools with a per-invocation timeout
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `tool` with `args` under the default timeout
    pub async fn run<I, S>(&self, tool: &Path, args: I) -> Result<ToolOutput, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_with_timeout(tool, args, self.timeout).await
    }

    /// Run `tool` with `args`, killing it if it outlives `timeout`
    pub async fn run_with_timeout<I, S>(
        &self,
        tool: &Path,
        args: I,
        timeout: Duration,
    ) -> Result<ToolOutput, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let name = tool_name(tool);
        let mut command = Command::new(tool);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = %name, command = ?command.as_std(), "Invoking external tool");
        let started = Instant::now();

        // Dropping the output future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(PipelineError::tool_failure(
                    name,
                    format!("failed to start {}: {}", tool.display(), e),
                ));
            }
            Err(_) => {
                warn!(tool = %name, timeout_secs = timeout.as_secs_f64(), "External tool timed out, killed");
                return Err(PipelineError::ToolTimeout {
                    tool: name,
                    timeout,
                });
            }
        };

        let result = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        debug!(
            tool = %name,
            exit_code = ?result.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "External tool finished"
        );

        Ok(result)
    }
}

/// Short display name of a tool (its file name)
pub fn tool_name(tool: &Path) -> String {
    tool.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| tool.display().to_string())
}
