//! Inventory management.
//!
//! Hosts and groups are loaded from YAML or INI files, or from a comma
//! separated host list (`-i web01,web02,`). Host patterns select the
//! targets of a run, and [`Inventory::host_vars`] merges group and host
//! variables for one host.

pub mod group;
pub mod host;

pub use group::Group;
pub use host::{Host, HostParseError};

use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("cannot read inventory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid host pattern: {0}")]
    InvalidPattern(String),

    #[error("no hosts matched pattern: {0}")]
    NoMatch(String),

    #[error("invalid INI format at line {line}: {message}")]
    InvalidIniFormat { line: usize, message: String },

    #[error("host parse error: {0}")]
    HostParse(#[from] HostParseError),
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

const ALL: &str = "all";
const UNGROUPED: &str = "ungrouped";

/// Hosts and groups, both kept sorted by name
#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: BTreeMap<String, Host>,
    groups: BTreeMap<String, Group>,
    source: Option<String>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Create an empty inventory holding only `all` and `ungrouped`
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(ALL.to_string(), Group::new(ALL));
        groups.insert(UNGROUPED.to_string(), Group::new(UNGROUPED));
        Self {
            hosts: BTreeMap::new(),
            groups,
            source: None,
        }
    }

    /// Inventory used when none is given: just `localhost`, run locally
    pub fn implicit_localhost() -> Self {
        let mut inventory = Self::new();
        let mut host = Host::new("localhost");
        host.set_var(
            "ansible_connection",
            serde_yaml::Value::String("local".to_string()),
        );
        inventory.add_host(host);
        inventory
    }

    /// Resolve an `-i` argument: an existing file, or a comma separated list
    pub fn from_source(source: &str) -> InventoryResult<Self> {
        if !Path::new(source).exists() && source.contains(',') {
            return Ok(Self::from_host_list(source));
        }
        Self::load(source)
    }

    /// Build an inventory from `web01,web02,` style input
    pub fn from_host_list(list: &str) -> Self {
        let mut inventory = Self::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            inventory.add_host(Host::new(name));
        }
        inventory.source = Some(list.to_string());
        inventory
    }

    /// Load inventory from a YAML or INI file
    pub fn load<P: AsRef<Path>>(path: P) -> InventoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut inventory = Self::new();
        inventory.source = Some(path.display().to_string());

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "yml" | "yaml" | "json" => inventory.parse_yaml(&content)?,
            "ini" => inventory.parse_ini(&content)?,
            _ if looks_like_ini(&content) => inventory.parse_ini(&content)?,
            _ => inventory.parse_yaml(&content)?,
        }

        inventory.compute_group_parents();
        debug!(
            source = %path.display(),
            hosts = inventory.hosts.len(),
            groups = inventory.groups.len(),
            "Loaded inventory"
        );
        Ok(inventory)
    }

    /// Parse an inventory from a YAML string (`all: {hosts, children, vars}`)
    pub fn from_yaml(content: &str) -> InventoryResult<Self> {
        let mut inventory = Self::new();
        inventory.parse_yaml(content)?;
        inventory.compute_group_parents();
        Ok(inventory)
    }

    /// Parse an inventory from an INI string
    pub fn from_ini(content: &str) -> InventoryResult<Self> {
        let mut inventory = Self::new();
        inventory.parse_ini(content)?;
        inventory.compute_group_parents();
        Ok(inventory)
    }

    fn parse_yaml(&mut self, content: &str) -> InventoryResult<()> {
        let data: serde_yaml::Value = serde_yaml::from_str(content)?;
        let Some(map) = data.as_mapping() else {
            return Ok(());
        };

        for (key, value) in map {
            if let Some(group_name) = key.as_str() {
                self.parse_yaml_group(group_name, value);
            }
        }
        Ok(())
    }

    fn parse_yaml_group(&mut self, name: &str, value: &serde_yaml::Value) {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group::new(name));

        let Some(map) = value.as_mapping() else {
            return;
        };

        if let Some(hosts) = map.get("hosts").and_then(|h| h.as_mapping()) {
            for (host_key, host_value) in hosts {
                let Some(host_name) = host_key.as_str() else {
                    continue;
                };
                let mut host = Host::new(host_name);
                if let Some(vars) = host_value.as_mapping() {
                    for (var_key, var_value) in vars {
                        if let Some(key) = var_key.as_str() {
                            host.set_var(key, var_value.clone());
                        }
                    }
                }
                self.place_host(host, name);
            }
        }

        if let Some(children) = map.get("children").and_then(|c| c.as_mapping()) {
            for (child_key, child_value) in children {
                if let Some(child_name) = child_key.as_str() {
                    if let Some(group) = self.groups.get_mut(name) {
                        group.add_child(child_name);
                    }
                    self.parse_yaml_group(child_name, child_value);
                }
            }
        }

        if let Some(vars) = map.get("vars").and_then(|v| v.as_mapping()) {
            if let Some(group) = self.groups.get_mut(name) {
                for (var_key, var_value) in vars {
                    if let Some(key) = var_key.as_str() {
                        group.set_var(key, var_value.clone());
                    }
                }
            }
        }
    }

    fn parse_ini(&mut self, content: &str) -> InventoryResult<()> {
        enum Section {
            Hosts,
            Vars,
            Children,
        }

        let mut current_group = UNGROUPED.to_string();
        let mut section = Section::Hosts;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let header = line
                    .strip_prefix('[')
                    .and_then(|l| l.strip_suffix(']'))
                    .filter(|h| !h.trim().is_empty())
                    .ok_or_else(|| InventoryError::InvalidIniFormat {
                        line: index + 1,
                        message: format!("malformed section header '{}'", line),
                    })?;

                (current_group, section) = match header.rsplit_once(':') {
                    Some((group, "vars")) => (group.to_string(), Section::Vars),
                    Some((group, "children")) => (group.to_string(), Section::Children),
                    _ => (header.to_string(), Section::Hosts),
                };
                self.groups
                    .entry(current_group.clone())
                    .or_insert_with(|| Group::new(current_group.as_str()));
                continue;
            }

            match section {
                Section::Vars => {
                    let (key, value) = line.split_once('=').ok_or_else(|| {
                        InventoryError::InvalidIniFormat {
                            line: index + 1,
                            message: format!("expected key=value, got '{}'", line),
                        }
                    })?;
                    if let Some(group) = self.groups.get_mut(&current_group) {
                        group.set_var(key.trim(), parse_ini_value(value));
                    }
                }
                Section::Children => {
                    if let Some(group) = self.groups.get_mut(&current_group) {
                        group.add_child(line);
                    }
                    self.groups
                        .entry(line.to_string())
                        .or_insert_with(|| Group::new(line));
                }
                Section::Hosts => {
                    let host = Host::parse(line)?;
                    self.place_host(host, &current_group);
                }
            }
        }

        Ok(())
    }

    /// Put `host` into `group` (and `all`), merging with an existing entry
    fn place_host(&mut self, host: Host, group: &str) {
        let name = host.name.clone();
        for target in [group, ALL] {
            self.groups
                .entry(target.to_string())
                .or_insert_with(|| Group::new(target))
                .add_host(name.clone());
        }

        match self.hosts.get_mut(&name) {
            Some(existing) => {
                existing.merge_vars(&host.vars);
                existing.add_to_group(group);
            }
            None => {
                let mut host = host;
                host.add_to_group(group);
                host.add_to_group(ALL);
                self.hosts.insert(name, host);
            }
        }
    }

    fn compute_group_parents(&mut self) {
        let edges: Vec<(String, String)> = self
            .groups
            .values()
            .flat_map(|g| g.children.iter().map(move |c| (g.name.clone(), c.clone())))
            .collect();

        for (parent, child) in edges {
            if let Some(group) = self.groups.get_mut(&child) {
                group.parents.insert(parent);
            }
        }
    }

    /// Add a host with no group of its own
    pub fn add_host(&mut self, host: Host) {
        self.place_host(host, UNGROUPED);
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// All hosts, sorted by name
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Hosts matching `pattern`, sorted by name.
    ///
    /// Supported patterns:
    /// - `all` or `*` - every host
    /// - `name` - a group (including child groups) or a single host
    /// - `web*`, `db?` - glob on host names
    /// - `~web\d+` - regex on host names
    /// - `a:b` or `a,b` - union
    /// - `a:&b` - intersection
    /// - `a:!b` - exclusion
    pub fn get_hosts_for_pattern(&self, pattern: &str) -> InventoryResult<Vec<&Host>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(InventoryError::InvalidPattern(pattern.to_string()));
        }

        let mut selected: BTreeSet<&str> = BTreeSet::new();
        let mut positive_seen = false;
        let mut intersections = Vec::new();
        let mut exclusions = Vec::new();

        for part in split_pattern(pattern) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(rest) = part.strip_prefix('&') {
                intersections.push(self.match_term(rest)?);
            } else if let Some(rest) = part.strip_prefix('!') {
                exclusions.push(self.match_term(rest)?);
            } else {
                positive_seen = true;
                selected.extend(self.match_term(part)?);
            }
        }

        if !positive_seen {
            selected = self.hosts.keys().map(String::as_str).collect();
        }
        for set in intersections {
            selected = selected.intersection(&set).copied().collect();
        }
        for set in exclusions {
            for name in set {
                selected.remove(name);
            }
        }

        if selected.is_empty() {
            return Err(InventoryError::NoMatch(pattern.to_string()));
        }

        Ok(selected
            .into_iter()
            .filter_map(|name| self.hosts.get(name))
            .collect())
    }

    /// Hosts matched by one pattern term, without operators
    fn match_term(&self, term: &str) -> InventoryResult<BTreeSet<&str>> {
        if term == ALL || term == "*" {
            return Ok(self.hosts.keys().map(String::as_str).collect());
        }

        if let Some(expr) = term.strip_prefix('~') {
            let regex =
                Regex::new(expr).map_err(|_| InventoryError::InvalidPattern(term.to_string()))?;
            return Ok(self.hosts_matching(&regex));
        }

        if term.contains(['*', '?', '[']) {
            let regex = Regex::new(&glob_to_regex(term))
                .map_err(|_| InventoryError::InvalidPattern(term.to_string()))?;
            return Ok(self.hosts_matching(&regex));
        }

        if self.groups.contains_key(term) {
            return Ok(self.hosts_in_group(term));
        }

        Ok(self
            .hosts
            .get_key_value(term)
            .map(|(name, _)| name.as_str())
            .into_iter()
            .collect())
    }

    fn hosts_matching(&self, regex: &Regex) -> BTreeSet<&str> {
        self.hosts
            .keys()
            .filter(|name| regex.is_match(name))
            .map(String::as_str)
            .collect()
    }

    /// Hosts of a group and of all its descendants
    fn hosts_in_group(&self, group: &str) -> BTreeSet<&str> {
        let mut hosts = BTreeSet::new();
        let mut stack = vec![group];
        let mut visited = BTreeSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name) {
                continue;
            }
            if let Some(group) = self.groups.get(name) {
                hosts.extend(
                    group
                        .hosts
                        .iter()
                        .filter_map(|h| self.hosts.get_key_value(h.as_str()))
                        .map(|(name, _)| name.as_str()),
                );
                stack.extend(group.children.iter().map(String::as_str));
            }
        }
        hosts
    }

    /// Distance of every ancestor group of `host` from the host itself.
    fn group_depths<'a>(&'a self, host: &'a Host) -> BTreeMap<&'a str, usize> {
        let mut depths: BTreeMap<&str, usize> = BTreeMap::new();
        let mut frontier: Vec<&str> = host.groups.iter().map(String::as_str).collect();
        let mut distance = 0;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for name in frontier {
                if depths.contains_key(name) {
                    continue;
                }
                depths.insert(name, distance);
                if let Some(group) = self.groups.get(name) {
                    next.extend(group.parents.iter().map(String::as_str));
                }
            }
            frontier = next;
            distance += 1;
        }
        depths
    }

    /// Merged variables for a host.
    ///
    /// `all` applies first, then groups from the most distant ancestor to the
    /// host's own groups (ties broken by name), then the host's own vars.
    pub fn host_vars(&self, host: &Host) -> IndexMap<String, serde_yaml::Value> {
        let mut ordered: Vec<(&str, usize)> = self.group_depths(host).into_iter().collect();
        ordered.sort_by(|(a_name, a_depth), (b_name, b_depth)| {
            (*a_name != ALL)
                .cmp(&(*b_name != ALL))
                .then(b_depth.cmp(a_depth))
                .then(a_name.cmp(b_name))
        });

        let mut vars = IndexMap::new();
        for (name, _) in ordered {
            if let Some(group) = self.groups.get(name) {
                for (key, value) in &group.vars {
                    vars.insert(key.clone(), value.clone());
                }
            }
        }
        for (key, value) in &host.vars {
            vars.insert(key.clone(), value.clone());
        }
        vars
    }

    /// [`host_vars`](Self::host_vars) converted to JSON values for modules
    pub fn host_vars_json(&self, host: &Host) -> HashMap<String, serde_json::Value> {
        self.host_vars(host)
            .into_iter()
            .filter_map(|(key, value)| serde_json::to_value(value).ok().map(|v| (key, v)))
            .collect()
    }
}

fn looks_like_ini(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with(';'))
        .is_some_and(|first| first.starts_with('[') && first.ends_with(']'))
        || !content.contains(':')
}

/// Split a pattern on `:` and `,`, except inside brackets
fn split_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth: usize = 0;

    for (i, ch) in pattern.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ':' | ',' if depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(&pattern[start..]);
    parts
}

/// Convert a shell glob to an anchored regex
fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '[' | ']' => regex.push(ch),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    regex
}

/// Parse an INI value: quoted strings, booleans, integers, else a string
pub(crate) fn parse_ini_value(value: &str) -> serde_yaml::Value {
    let value = value.trim();

    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return serde_yaml::Value::String(value[1..value.len() - 1].to_string());
        }
    }

    match value.to_lowercase().as_str() {
        "true" | "yes" => return serde_yaml::Value::Bool(true),
        "false" | "no" => return serde_yaml::Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = value.parse::<i64>() {
        return serde_yaml::Value::Number(n.into());
    }

    serde_yaml::Value::String(value.to_string())
}

impl std::fmt::Display for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Inventory ({} hosts, {} groups)", self.hosts.len(), self.groups.len())?;
        for group in self.groups.values() {
            if group.hosts.is_empty() {
                continue;
            }
            writeln!(f, "  [{}]", group.name)?;
            for host in group.hosts.iter().filter_map(|h| self.hosts.get(h)) {
                writeln!(f, "    {}", host)?;
            }
        }
        Ok(())
    }
}
