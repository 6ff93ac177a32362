//! Connection layer for reaching the site executor.
//!
//! Modules never talk to a host directly. They run a command through a
//! [`Connection`] and read its output, so the transport can be swapped (or
//! mocked in tests) without touching module code.
//!
//! # Example
//!
//! ```rust,ignore
//! use iis_site::connection::{Connection, ExecuteOptions, LocalConnection};
//!
//! let conn = LocalConnection::with_identifier("web01");
//! let opts = ExecuteOptions::new()
//!     .with_env("IIS_SITE_HOST", "web01")
//!     .with_input(r#"{"action":"query"}"#)
//!     .with_timeout(30);
//! let result = conn.execute("iis-site-executor", Some(opts)).await?;
//! println!("Output: {}", result.stdout);
//! ```

/// Local execution connection implementation.
pub mod local;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use local::LocalConnection;

/// Errors raised by a transport.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Command could not be started or waited on (not a non-zero exit code).
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Configuration is invalid or incomplete.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Outcome of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code of the command (0 typically indicates success).
    pub exit_code: i32,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
    /// Convenience flag: `true` if `exit_code == 0`.
    pub success: bool,
}

impl CommandResult {
    /// Create a new successful command result
    pub fn success(stdout: String, stderr: String) -> Self {
        Self {
            exit_code: 0,
            stdout,
            stderr,
            success: true,
        }
    }

    /// Create a new failed command result
    pub fn failure(exit_code: i32, stdout: String, stderr: String) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            success: false,
        }
    }

    /// Get the combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Options for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Working directory for the command
    pub cwd: Option<String>,
    /// Environment variables to set
    pub env: HashMap<String, String>,
    /// Timeout in seconds (None for no timeout)
    pub timeout: Option<u64>,
    /// Data written to the command's stdin, which is then closed
    pub input: Option<String>,
}

impl ExecuteOptions {
    /// Create new execute options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Feed `input` to the command on stdin
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// A way of running commands on behalf of one target host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the connection identifier (usually the inventory host name)
    fn identifier(&self) -> &str;

    /// Check if the connection is still alive
    async fn is_alive(&self) -> bool;

    /// Execute a command
    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandResult>;
}
