//! Backend that inspects and changes IIS sites on a host.
//!
//! [`SiteExecutor`] is the seam between the resource descriptor and the host.
//! The descriptor only validates and shapes results; deciding how to create,
//! start, stop or remove a site is entirely the executor's business.
//!
//! [`ScriptExecutor`] speaks a small JSON protocol with an external command:
//!
//! ```text
//! stdin:  {"action": "query"|"apply", "check_mode": false, "params": {...}}
//! stdout: {"changed": true, "site": {...} | null, "msg": "..."}
//!     or  {"failed": true, "msg": "...", "reason": "not_found"}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use super::site_info::SiteInfo;
use super::win_iis_website::WebsiteParams;
use crate::connection::{CommandResult, Connection, ConnectionError, ExecuteOptions};
use crate::modules::{ModuleContext, ModuleError, ModuleResult, ParamExt};

/// Host variable naming the executor command.
pub const EXECUTOR_VAR: &str = "iis_site_executor";
/// Host variable overriding the executor timeout, in seconds.
pub const EXECUTOR_TIMEOUT_VAR: &str = "iis_site_executor_timeout";
/// Host variable with the address substituted for `{host}`.
pub const ADDRESS_VAR: &str = "ansible_host";
/// Environment variable the executor receives with the target address.
pub const HOST_ENV: &str = "IIS_SITE_HOST";

/// Why the executor refused or failed an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "snake_case")]
pub enum ExecutionFailureKind {
    NotFound,
    InvalidPhysicalPath,
    PermissionDenied,
    PoolMissing,
    Other,
}

impl From<String> for ExecutionFailureKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "not_found" => ExecutionFailureKind::NotFound,
            "invalid_physical_path" => ExecutionFailureKind::InvalidPhysicalPath,
            "permission_denied" => ExecutionFailureKind::PermissionDenied,
            "pool_missing" => ExecutionFailureKind::PoolMissing,
            _ => ExecutionFailureKind::Other,
        }
    }
}

impl fmt::Display for ExecutionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailureKind::NotFound => write!(f, "not_found"),
            ExecutionFailureKind::InvalidPhysicalPath => write!(f, "invalid_physical_path"),
            ExecutionFailureKind::PermissionDenied => write!(f, "permission_denied"),
            ExecutionFailureKind::PoolMissing => write!(f, "pool_missing"),
            ExecutionFailureKind::Other => write!(f, "other"),
        }
    }
}

/// A failure reported by the executor. The message is kept verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub kind: ExecutionFailureKind,
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(kind: ExecutionFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// What the module asks the executor to converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub params: WebsiteParams,
    pub check_mode: bool,
}

/// What the executor reports after converging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub changed: bool,
    /// Site after the operation, `None` once it has been removed
    pub site: Option<SiteInfo>,
    pub msg: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteExecutor: Send + Sync {
    /// Current state of the site named in `params`, `None` if it does not exist.
    async fn query_state(&self, params: &WebsiteParams) -> ModuleResult<Option<SiteInfo>>;

    /// Bring the site to the requested state (or report what would change).
    async fn apply_state(&self, request: &ApplyRequest) -> ModuleResult<ApplyOutcome>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Query,
    Apply,
}

#[derive(Debug, Serialize)]
struct ExecutorRequest<'a> {
    action: Action,
    check_mode: bool,
    params: &'a WebsiteParams,
}

#[derive(Debug, Deserialize)]
struct ExecutorResponse {
    #[serde(default)]
    changed: bool,
    #[serde(default)]
    failed: bool,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    reason: Option<ExecutionFailureKind>,
    #[serde(default)]
    site: Option<SiteInfo>,
}

/// Runs an external command per operation and exchanges JSON with it.
///
/// The command may contain `{host}`, replaced by the target's shell-quoted
/// address before it runs.
pub struct ScriptExecutor {
    connection: Arc<dyn Connection + Send + Sync>,
    command: String,
    address: String,
    timeout: Option<u64>,
}

impl fmt::Debug for ScriptExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptExecutor")
            .field("connection", &self.connection.identifier())
            .field("command", &self.command)
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ScriptExecutor {
    pub fn new(connection: Arc<dyn Connection + Send + Sync>, command: impl Into<String>) -> Self {
        let address = connection.identifier().to_string();
        Self {
            connection,
            command: command.into(),
            address,
            timeout: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build an executor from the context's connection and host variables.
    pub fn from_context(context: &ModuleContext) -> ModuleResult<Self> {
        let connection = context.connection.clone().ok_or_else(|| {
            ConnectionError::InvalidConfig("no connection available for the site executor".into())
        })?;

        let command = context
            .vars
            .get_string(EXECUTOR_VAR)?
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ConnectionError::InvalidConfig(format!(
                    "no site executor configured: set the '{}' host variable or [executor] command",
                    EXECUTOR_VAR
                ))
            })?;

        let mut executor = Self::new(connection, command)
            .with_timeout(context.vars.get_u64(EXECUTOR_TIMEOUT_VAR)?);
        if let Some(address) = context.vars.get_string(ADDRESS_VAR)? {
            executor = executor.with_address(address);
        } else if let Some(host) = &context.host {
            executor = executor.with_address(host.clone());
        }
        Ok(executor)
    }

    /// Command line with `{host}` substituted.
    pub fn render_command(&self) -> String {
        self.command
            .replace("{host}", &shell_words::quote(&self.address))
    }

    async fn invoke(
        &self,
        action: Action,
        check_mode: bool,
        params: &WebsiteParams,
    ) -> ModuleResult<ExecutorResponse> {
        let request = ExecutorRequest {
            action,
            check_mode,
            params,
        };
        let input = serde_json::to_string(&request).map_err(|e| {
            ModuleError::InvalidParameter(format!("cannot encode executor request: {}", e))
        })?;

        let mut options = ExecuteOptions::new()
            .with_env(HOST_ENV, self.address.clone())
            .with_input(input);
        if let Some(timeout) = self.timeout {
            options = options.with_timeout(timeout);
        }

        let command = self.render_command();
        debug!(host = %self.address, action = ?action, check_mode, "Invoking site executor");
        let result = self.connection.execute(&command, Some(options)).await?;
        trace!(exit_code = result.exit_code, stdout = %result.stdout, "Site executor returned");

        Ok(Self::parse_response(&result)?)
    }

    /// Decode the executor's reply. Anything before the first `{` is ignored.
    fn parse_response(result: &CommandResult) -> Result<ExecutorResponse, ExecutionFailure> {
        let stdout = result.stdout.trim();
        let json = match stdout.find('{') {
            Some(pos) => &stdout[pos..],
            None => stdout,
        };

        let response: ExecutorResponse = serde_json::from_str(json).map_err(|e| {
            if result.exit_code != 0 {
                let stderr = result.stderr.trim();
                let message = if stderr.is_empty() {
                    format!("site executor exited with code {}", result.exit_code)
                } else {
                    stderr.to_string()
                };
                ExecutionFailure::new(ExecutionFailureKind::Other, message)
            } else {
                ExecutionFailure::new(
                    ExecutionFailureKind::Other,
                    format!("cannot parse site executor output as JSON: {}. Output: {}", e, stdout),
                )
            }
        })?;

        if response.failed || result.exit_code != 0 {
            let message = response
                .msg
                .clone()
                .unwrap_or_else(|| format!("site executor failed with code {}", result.exit_code));
            return Err(ExecutionFailure::new(
                response.reason.unwrap_or(ExecutionFailureKind::Other),
                message,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl SiteExecutor for ScriptExecutor {
    async fn query_state(&self, params: &WebsiteParams) -> ModuleResult<Option<SiteInfo>> {
        let response = self.invoke(Action::Query, false, params).await?;
        Ok(response.site)
    }

    async fn apply_state(&self, request: &ApplyRequest) -> ModuleResult<ApplyOutcome> {
        let response = self
            .invoke(Action::Apply, request.check_mode, &request.params)
            .await?;
        Ok(ApplyOutcome {
            changed: response.changed,
            site: response.site,
            msg: response.msg,
        })
    }
}
