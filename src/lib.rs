//! # iis-site - Declarative IIS web site management
//!
//! iis-site describes an IIS web site as a small, strongly validated
//! parameter set (`win_iis_website`) and delegates the actual work on the
//! Windows host to an injected site executor.
//!
//! ## Core Concepts
//!
//! - **Schema**: The static parameter contract of a module, including types,
//!   choices and the version each option was introduced in
//! - **Validator**: Turns a loose parameter mapping into [`WebsiteParams`] or
//!   reports every offending field at once
//! - **Site executor**: The capability that queries and applies site state
//!   on the target; nothing is delegated until validation succeeds
//! - **Inventory**: Hosts and groups the ad-hoc runner targets
//! - **Connections**: How the executor command is launched
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      CLI (ad-hoc)                         │
//! │        -i inventory  -m module  -a args  PATTERN          │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!              ┌──────────────┼──────────────┐
//!              ▼                             ▼
//! ┌──────────────────────────┐  ┌──────────────────────────┐
//! │        Inventory          │  │     Module Registry      │
//! │   (hosts, groups, vars)   │  │  schema + validator +    │
//! │                           │  │  win_iis_website         │
//! └──────────────────────────┘  └──────────────────────────┘
//!                                            │
//!                                            ▼
//!                              ┌──────────────────────────┐
//!                              │      Site executor        │
//!                              │ (JSON over a Connection)  │
//!                              └──────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use iis_site::prelude::*;
//! use serde_json::json;
//!
//! let validator = WebsiteValidator::default();
//! let params = validator.validate(&[("name".to_string(), json!("acme"))].into())?;
//! assert_eq!(params.name, "acme");
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::connection::{
        CommandResult, Connection, ConnectionError, ConnectionResult, ExecuteOptions,
        LocalConnection,
    };
    pub use crate::error::{Error, Result};
    pub use crate::inventory::{Group, Host, Inventory};
    pub use crate::modules::windows::{
        ApplyOutcome, ApplyRequest, ExecutionFailure, ExecutionFailureKind, ScriptExecutor,
        SiteExecutor, SiteInfo, SiteParameters, SiteState, WebsiteParams, WebsiteValidator,
        WinIisWebsiteModule,
    };
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleRegistry, ModuleResult,
        ModuleSchema, ValidationError, ValidationErrors,
    };
}

/// Configuration loading (system, user, project files and environment).
pub mod config;

/// Connection layer used to launch site executors.
pub mod connection;

pub mod error;

/// Hosts, groups and host patterns.
pub mod inventory;

pub mod logging;

/// Module trait, registry, schemas and the IIS web site module.
pub mod modules;

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
