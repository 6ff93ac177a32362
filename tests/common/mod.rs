//! Shared test utilities and fixtures for the iis-site test suite.
//!
//! This module provides:
//! - `FakeExecutor`, an in-memory IIS that records every request
//! - `MockConnection`, which records commands and replies with canned output
//! - Small builders for parameters and site records
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use iis_site::connection::{
    CommandResult, Connection, ConnectionError, ConnectionResult, ExecuteOptions,
};
use iis_site::modules::windows::{
    ApplyOutcome, ApplyRequest, ExecutionFailure, SiteExecutor, SiteInfo, SiteRunState, SiteState,
    WebsiteParams,
};
use iis_site::modules::{ModuleParams, ModuleResult};

// ============================================================================
// Helper Functions
// ============================================================================

/// Build module parameters from a JSON object literal.
pub fn params(value: serde_json::Value) -> ModuleParams {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// A site record in the shape IIS reports it.
pub fn site(id: u64, name: &str, state: SiteRunState) -> SiteInfo {
    SiteInfo {
        id,
        name: name.to_string(),
        application_pool: name.to_string(),
        physical_path: format!("C:\\sites\\{}", name),
        bindings: vec!["*:80:".to_string()],
        state,
    }
}

// ============================================================================
// Fake Executor
// ============================================================================

/// In-memory site executor.
///
/// Holds at most one site and converges it the way IIS would: `absent`
/// removes it, any other state creates it when missing and sets the run
/// state. Check mode computes the outcome without storing it.
#[derive(Debug, Default)]
pub struct FakeExecutor {
    site: RwLock<Option<SiteInfo>>,
    failure: RwLock<Option<ExecutionFailure>>,
    queries: RwLock<Vec<WebsiteParams>>,
    applied: RwLock<Vec<ApplyRequest>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor whose host already has `site`.
    pub fn with_site(site: SiteInfo) -> Self {
        let executor = Self::default();
        *executor.site.write() = Some(site);
        executor
    }

    /// Every call fails with `failure`.
    pub fn failing(failure: ExecutionFailure) -> Self {
        let executor = Self::default();
        *executor.failure.write() = Some(failure);
        executor
    }

    pub fn current(&self) -> Option<SiteInfo> {
        self.site.read().clone()
    }

    pub fn queries(&self) -> Vec<WebsiteParams> {
        self.queries.read().clone()
    }

    pub fn applied(&self) -> Vec<ApplyRequest> {
        self.applied.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.read().len() + self.applied.read().len()
    }

    fn converge(current: Option<&SiteInfo>, params: &WebsiteParams) -> Option<SiteInfo> {
        if params.state == Some(SiteState::Absent) {
            return None;
        }

        let mut site = current.cloned().unwrap_or_else(|| SiteInfo {
            id: params
                .site_id
                .as_deref()
                .and_then(|id| id.parse().ok())
                .unwrap_or(1),
            name: params.name.clone(),
            application_pool: "DefaultAppPool".to_string(),
            physical_path: String::new(),
            bindings: Vec::new(),
            state: SiteRunState::Started,
        });

        if let Some(path) = &params.physical_path {
            site.physical_path = path.clone();
        }
        if let Some(pool) = &params.application_pool {
            site.application_pool = pool.clone();
        }
        if let Some(binding) = params.binding() {
            let binding = binding.to_string();
            if !site.bindings.contains(&binding) {
                site.bindings.push(binding);
            }
        }
        match params.state {
            Some(SiteState::Started) | Some(SiteState::Restarted) => {
                site.state = SiteRunState::Started
            }
            Some(SiteState::Stopped) => site.state = SiteRunState::Stopped,
            _ => {}
        }
        Some(site)
    }
}

#[async_trait]
impl SiteExecutor for FakeExecutor {
    async fn query_state(&self, params: &WebsiteParams) -> ModuleResult<Option<SiteInfo>> {
        self.queries.write().push(params.clone());
        if let Some(failure) = self.failure.read().clone() {
            return Err(failure.into());
        }
        Ok(self
            .site
            .read()
            .clone()
            .filter(|site| site.name == params.name))
    }

    async fn apply_state(&self, request: &ApplyRequest) -> ModuleResult<ApplyOutcome> {
        self.applied.write().push(request.clone());
        if let Some(failure) = self.failure.read().clone() {
            return Err(failure.into());
        }

        let before = self
            .site
            .read()
            .clone()
            .filter(|site| site.name == request.params.name);
        let after = Self::converge(before.as_ref(), &request.params);
        let restarted = request.params.state == Some(SiteState::Restarted) && after.is_some();
        let changed = before != after || restarted;

        if !request.check_mode {
            *self.site.write() = after.clone();
        }

        Ok(ApplyOutcome {
            changed,
            site: after,
            msg: None,
        })
    }
}

// ============================================================================
// Mock Connection
// ============================================================================

/// A mock connection for testing the script executor.
///
/// Replies are consumed in order; once exhausted the default reply is used.
#[derive(Debug)]
pub struct MockConnection {
    identifier: String,
    replies: RwLock<VecDeque<ConnectionResult<CommandResult>>>,
    default_reply: RwLock<CommandResult>,
    commands_executed: RwLock<Vec<(String, ExecuteOptions)>>,
    command_count: AtomicU32,
}

impl MockConnection {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            replies: RwLock::new(VecDeque::new()),
            default_reply: RwLock::new(CommandResult::success(String::new(), String::new())),
            commands_executed: RwLock::new(Vec::new()),
            command_count: AtomicU32::new(0),
        }
    }

    /// Queue a successful reply with `stdout`.
    pub fn reply(&self, stdout: impl Into<String>) {
        self.replies
            .write()
            .push_back(Ok(CommandResult::success(stdout.into(), String::new())));
    }

    /// Queue a raw command result.
    pub fn reply_with(&self, result: CommandResult) {
        self.replies.write().push_back(Ok(result));
    }

    /// Queue a connection-level error.
    pub fn fail_with(&self, error: ConnectionError) {
        self.replies.write().push_back(Err(error));
    }

    pub fn set_default_reply(&self, result: CommandResult) {
        *self.default_reply.write() = result;
    }

    pub fn command_count(&self) -> u32 {
        self.command_count.load(Ordering::SeqCst)
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands_executed
            .read()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    /// JSON requests written to stdin, in order.
    pub fn get_requests(&self) -> Vec<serde_json::Value> {
        self.commands_executed
            .read()
            .iter()
            .filter_map(|(_, options)| options.input.as_deref())
            .filter_map(|input| serde_json::from_str(input).ok())
            .collect()
    }

    pub fn get_options(&self) -> Vec<ExecuteOptions> {
        self.commands_executed
            .read()
            .iter()
            .map(|(_, options)| options.clone())
            .collect()
    }
}

#[async_trait]
impl Connection for MockConnection {
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
        self.command_count.fetch_add(1, Ordering::SeqCst);
        self.commands_executed
            .write()
            .push((command.to_string(), options.unwrap_or_default()));

        match self.replies.write().pop_front() {
            Some(reply) => reply,
            None => Ok(self.default_reply.read().clone()),
        }
    }
}
