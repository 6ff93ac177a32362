//! Inventory hosts.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Errors that can occur when parsing an INI host line
#[derive(Debug, thiserror::Error)]
pub enum HostParseError {
    #[error("empty host definition")]
    EmptyInput,
    #[error("unbalanced quotes in host definition: {0}")]
    Quoting(String),
    #[error("expected key=value, got '{0}'")]
    InvalidVariable(String),
}

/// A managed host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Inventory name (hostname, IP or alias)
    pub name: String,

    /// Address to reach the host at, if different from the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible_host: Option<String>,

    #[serde(default)]
    pub vars: IndexMap<String, serde_yaml::Value>,

    #[serde(skip)]
    pub groups: BTreeSet<String>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ansible_host: None,
            vars: IndexMap::new(),
            groups: BTreeSet::new(),
        }
    }

    pub fn with_address(name: impl Into<String>, address: impl Into<String>) -> Self {
        let mut host = Self::new(name);
        host.ansible_host = Some(address.into());
        host
    }

    /// Address to connect to
    pub fn address(&self) -> &str {
        self.ansible_host.as_deref().unwrap_or(&self.name)
    }

    /// Set a variable; `ansible_host` also updates the address.
    pub fn set_var(&mut self, key: impl Into<String>, value: serde_yaml::Value) {
        let key = key.into();
        if key == "ansible_host" {
            if let Some(address) = value.as_str() {
                self.ansible_host = Some(address.to_string());
            }
        }
        self.vars.insert(key, value);
    }

    pub fn get_var(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.vars.get(key)
    }

    pub fn add_to_group(&mut self, group: impl Into<String>) {
        self.groups.insert(group.into());
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    pub fn merge_vars(&mut self, other: &IndexMap<String, serde_yaml::Value>) {
        for (key, value) in other {
            self.set_var(key.clone(), value.clone());
        }
    }

    /// Parse an INI host line, e.g.
    /// `web01 ansible_host=10.0.0.5 iis_site_executor="pwsh -File site.ps1"`.
    pub fn parse(input: &str) -> Result<Self, HostParseError> {
        let words =
            shell_words::split(input).map_err(|_| HostParseError::Quoting(input.to_string()))?;
        let mut words = words.into_iter();
        let name = words.next().ok_or(HostParseError::EmptyInput)?;

        let mut host = Host::new(name);
        for word in words {
            let (key, value) = word
                .split_once('=')
                .ok_or_else(|| HostParseError::InvalidVariable(word.clone()))?;
            host.set_var(key, super::parse_ini_value(value));
        }

        Ok(host)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(addr) = &self.ansible_host {
            write!(f, " ({})", addr)?;
        }
        Ok(())
    }
}
