//! Inventory groups.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named set of hosts with shared variables and child groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    /// Hosts listed directly under this group
    #[serde(default)]
    pub hosts: BTreeSet<String>,

    /// Child group names
    #[serde(default)]
    pub children: BTreeSet<String>,

    /// Parent group names (computed from children relationships)
    #[serde(skip)]
    pub parents: BTreeSet<String>,

    #[serde(default)]
    pub vars: IndexMap<String, serde_yaml::Value>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: BTreeSet::new(),
            children: BTreeSet::new(),
            parents: BTreeSet::new(),
            vars: IndexMap::new(),
        }
    }

    pub fn add_host(&mut self, host: impl Into<String>) {
        self.hosts.insert(host.into());
    }

    pub fn has_host(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    pub fn add_child(&mut self, child: impl Into<String>) {
        self.children.insert(child.into());
    }

    pub fn has_child(&self, child: &str) -> bool {
        self.children.contains(child)
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: serde_yaml::Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn get_var(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.vars.get(key)
    }
}
