//! Local connection module
//!
//! Runs commands on the control node through the platform shell.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{CommandResult, Connection, ConnectionError, ConnectionResult, ExecuteOptions};

/// Local connection for executing commands on the current host
#[derive(Debug, Clone)]
pub struct LocalConnection {
    /// Identifier for this connection
    identifier: String,
}

impl LocalConnection {
    /// Create a new local connection named after this machine
    pub fn new() -> Self {
        let identifier = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "localhost".to_string());

        Self { identifier }
    }

    /// Create a local connection with a custom identifier
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    fn build_command(&self, command: &str, options: &ExecuteOptions) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };

        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let stdin = if options.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        cmd.stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

impl Default for LocalConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult> {
        let options = options.unwrap_or_default();
        debug!(host = %self.identifier, command = %command, "Executing local command");

        let mut cmd = self.build_command(command, &options);

        let mut child = cmd.spawn().map_err(|e| {
            ConnectionError::ExecutionFailed(format!("Failed to spawn process: {}", e))
        })?;
        let stdin = child.stdin.take();

        // the deadline covers feeding stdin as well as waiting
        let run = async {
            if let (Some(input), Some(mut stdin)) = (options.input.as_deref(), stdin) {
                match stdin.write_all(input.as_bytes()).await {
                    Ok(()) => {}
                    // the child may exit without reading its input
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                        trace!(host = %self.identifier, "Command closed stdin early");
                    }
                    Err(e) => {
                        return Err(ConnectionError::ExecutionFailed(format!(
                            "Failed to write stdin: {}",
                            e
                        )))
                    }
                }
                // dropping stdin closes the pipe so the child sees EOF
                drop(stdin);
            }

            child.wait_with_output().await.map_err(|e| {
                ConnectionError::ExecutionFailed(format!("Failed to wait for process: {}", e))
            })
        };

        let output = match options.timeout {
            Some(timeout_secs) => {
                let timeout = tokio::time::Duration::from_secs(timeout_secs);
                tokio::time::timeout(timeout, run)
                    .await
                    .map_err(|_| ConnectionError::Timeout(timeout_secs))??
            }
            None => run.await?,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        trace!(exit_code = %exit_code, stdout_len = %stdout.len(), stderr_len = %stderr.len(), "Command completed");

        if output.status.success() {
            Ok(CommandResult::success(stdout, stderr))
        } else {
            Ok(CommandResult::failure(exit_code, stdout, stderr))
        }
    }
}
