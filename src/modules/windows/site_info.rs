//! Site records as reported by IIS.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Run state of a site on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum SiteRunState {
    Started,
    Stopped,
    Starting,
    Stopping,
    Unknown,
}

impl From<String> for SiteRunState {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "started" => SiteRunState::Started,
            "stopped" => SiteRunState::Stopped,
            "starting" => SiteRunState::Starting,
            "stopping" => SiteRunState::Stopping,
            _ => SiteRunState::Unknown,
        }
    }
}

impl fmt::Display for SiteRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteRunState::Started => write!(f, "Started"),
            SiteRunState::Stopped => write!(f, "Stopped"),
            SiteRunState::Starting => write!(f, "Starting"),
            SiteRunState::Stopping => write!(f, "Stopping"),
            SiteRunState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A site as it exists on the host, in the shape IIS reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteInfo {
    #[serde(rename = "ID")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub application_pool: String,
    #[serde(default)]
    pub physical_path: String,
    #[serde(default)]
    pub bindings: Vec<String>,
    pub state: SiteRunState,
}

impl SiteInfo {
    /// Parse every binding string. Fails on the first malformed one.
    pub fn parsed_bindings(&self) -> Result<Vec<Binding>, BindingParseError> {
        self.bindings.iter().map(|b| b.parse()).collect()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingParseError {
    #[error("binding '{0}' is not of the form ip:port:hostname")]
    Shape(String),

    #[error("binding '{binding}' has an invalid port '{port}'")]
    Port { binding: String, port: String },
}

/// One `ip:port:hostname` binding triple.
///
/// `ip` is `*` for all addresses; IPv6 addresses keep their brackets
/// (`[::1]:443:`). The hostname may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub ip: String,
    pub port: u16,
    pub hostname: String,
}

impl Binding {
    pub fn new(ip: impl Into<String>, port: u16, hostname: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            hostname: hostname.into(),
        }
    }
}

impl FromStr for Binding {
    type Err = BindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // hostnames never contain ':', IPv6 addresses do
        let mut parts = s.rsplitn(3, ':');
        let (Some(hostname), Some(port), Some(ip)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(BindingParseError::Shape(s.to_string()));
        };
        if ip.is_empty() {
            return Err(BindingParseError::Shape(s.to_string()));
        }
        let port = port.parse().map_err(|_| BindingParseError::Port {
            binding: s.to_string(),
            port: port.to_string(),
        })?;
        Ok(Binding::new(ip, port, hostname))
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.ip, self.port, self.hostname)
    }
}
