//! Error types for iis-site.
//!
//! Each layer owns a `thiserror` enum; this module gathers them into the
//! crate-level [`Error`] that the command-line tool maps to an exit code.

use thiserror::Error;

use crate::config::ConfigError;
use crate::connection::ConnectionError;
use crate::inventory::InventoryError;
use crate::modules::ModuleError;

/// Result type alias for iis-site operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for iis-site.
#[derive(Error, Debug)]
pub enum Error {
    /// Module arguments could not be parsed.
    #[error("Invalid module arguments: {0}")]
    ModuleArgs(String),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ModuleArgs(_) => 4,
            Error::Module(e) if e.is_validation() => 4,
            Error::Inventory(_) => 5,
            _ => 1,
        }
    }
}
