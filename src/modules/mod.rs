//! Module system for iis-site
//!
//! This module provides the core trait, types and registry for modules.
//! A module validates a flat parameter mapping against its schema and hands
//! the normalised result to whatever backend actually touches the target.

pub mod schema;
pub mod windows;

pub use schema::{
    ModuleMetadata, ModuleSchema, NormalizedParams, OptionSpec, ParamType, ValidationError,
    ValidationErrors,
};
pub use windows::WinIisWebsiteModule;

use crate::connection::{Connection, ConnectionError};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use windows::site_executor::ExecutionFailure;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0}")]
    Execution(#[from] ExecutionFailure),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl ModuleError {
    /// True when the failure happened before anything was sent to the target.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ModuleError::Validation(_) | ModuleError::InvalidParameter(_) | ModuleError::NotFound(_)
        )
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Status of a module execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module executed successfully and made changes
    Changed,
    /// Module executed successfully but no changes were needed
    Ok,
    /// Module execution failed
    Failed,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Changed => write!(f, "changed"),
            ModuleStatus::Ok => write!(f, "ok"),
            ModuleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Represents a difference between current and desired state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub before: String,
    pub after: String,
}

impl Diff {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }

    /// True when both sides render identically.
    pub fn is_empty(&self) -> bool {
        self.before == self.after
    }
}

/// Result of a module execution
///
/// Serialises to the flat result mapping callers expect: `changed`, `msg`,
/// `failed` when set, and every data key at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Whether the module changed anything
    pub changed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    /// Human-readable message about what happened
    pub msg: String,
    #[serde(skip)]
    pub status: Option<ModuleStatus>,
    /// Before/after rendering, only populated in diff mode
    #[serde(skip)]
    pub diff: Option<Diff>,
    /// Additional data returned by the module
    #[serde(flatten)]
    pub data: IndexMap<String, serde_json::Value>,
}

impl ModuleOutput {
    fn with_status(status: ModuleStatus, msg: impl Into<String>) -> Self {
        Self {
            changed: status == ModuleStatus::Changed,
            failed: status == ModuleStatus::Failed,
            msg: msg.into(),
            status: Some(status),
            diff: None,
            data: IndexMap::new(),
        }
    }

    /// Create a new successful output with no changes
    pub fn ok(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Ok, msg)
    }

    /// Create a new successful output with changes
    pub fn changed(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Changed, msg)
    }

    /// Create a failed output
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::with_status(ModuleStatus::Failed, msg)
    }

    pub fn status(&self) -> ModuleStatus {
        self.status.unwrap_or(if self.failed {
            ModuleStatus::Failed
        } else if self.changed {
            ModuleStatus::Changed
        } else {
            ModuleStatus::Ok
        })
    }

    /// Add a diff to the output
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Add data to the output
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Parameters passed to a module
pub type ModuleParams = HashMap<String, serde_json::Value>;

/// Context for module execution
#[derive(Clone, Default)]
pub struct ModuleContext {
    /// Whether to run in check mode (dry run)
    pub check_mode: bool,
    /// Whether to show diffs
    pub diff_mode: bool,
    /// Name of the target host, as written in the inventory
    pub host: Option<String>,
    /// Variables available to the module
    pub vars: HashMap<String, serde_json::Value>,
    /// Connection used to reach the executor
    pub connection: Option<Arc<dyn Connection + Send + Sync>>,
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("check_mode", &self.check_mode)
            .field("diff_mode", &self.diff_mode)
            .field("host", &self.host)
            .field("vars", &self.vars)
            .field(
                "connection",
                &self.connection.as_ref().map(|c| c.identifier()),
            )
            .finish()
    }
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    pub fn with_diff_mode(mut self, diff_mode: bool) -> Self {
        self.diff_mode = diff_mode;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_vars(mut self, vars: HashMap<String, serde_json::Value>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_connection(mut self, connection: Arc<dyn Connection + Send + Sync>) -> Self {
        self.connection = Some(connection);
        self
    }
}

/// Trait that all modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Returns the name of the module
    fn name(&self) -> &'static str;

    /// Returns a description of what the module does
    fn description(&self) -> &'static str;

    /// Returns the static argument specification
    fn schema(&self) -> &ModuleSchema;

    /// Validate the parameters before execution
    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        self.schema().check(params)?;
        Ok(())
    }

    /// Validate, then hand the parameters to the backend
    async fn run(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput>;
}

/// Helper trait for extracting parameters
pub trait ParamExt {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>>;
    fn get_u64(&self, key: &str) -> ModuleResult<Option<u64>>;
}

impl ParamExt for HashMap<String, serde_json::Value> {
    fn get_string(&self, key: &str) -> ModuleResult<Option<String>> {
        match self.get(key) {
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(serde_json::Value::Array(_)) | Some(serde_json::Value::Object(_)) => Err(
                ModuleError::InvalidParameter(format!("{} must be a string", key)),
            ),
            Some(v) => Ok(Some(v.to_string())),
        }
    }

    fn get_u64(&self, key: &str) -> ModuleResult<Option<u64>> {
        match self.get(key) {
            Some(serde_json::Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                ModuleError::InvalidParameter(format!("{} must be a positive integer", key))
            }),
            Some(serde_json::Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
                ModuleError::InvalidParameter(format!("{} must be a positive integer", key))
            }),
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(_) => Err(ModuleError::InvalidParameter(format!(
                "{} must be a positive integer",
                key
            ))),
        }
    }
}

/// Registry for looking up modules by name
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WinIisWebsiteModule::new()));
        registry
    }

    /// Register a module
    pub fn register(&mut self, module: Arc<dyn Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Get a module by name, failing with `NotFound`
    pub fn require(&self, name: &str) -> ModuleResult<Arc<dyn Module>> {
        self.get(name)
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a module by name
    pub async fn execute(
        &self,
        name: &str,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let module = self.require(name)?;
        module.run(params, context).await
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
