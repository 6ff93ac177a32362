//! Custom IIS site parameters.
//!
//! The `parameters` option packs several IIS settings into one string:
//!
//! ```text
//! list  := entry ("|" entry)*
//! entry := key ":" value
//! key   := 1*(any char except ":" and "|")
//! value := *(any char except "|")
//! ```
//!
//! A key ends at the first `:`, so values may themselves contain colons
//! (`logfile.directory:D:\logs`). Nothing is trimmed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a `parameters` string is rejected. Entry numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParametersSyntaxError {
    #[error("parameters string is empty")]
    Empty,

    #[error("entry {entry} is empty")]
    EmptyEntry { entry: usize },

    #[error("entry {entry} ('{text}') has no ':' between key and value")]
    MissingSeparator { entry: usize, text: String },

    #[error("entry {entry} has an empty key")]
    EmptyKey { entry: usize },

    #[error("entry {entry} repeats key '{key}'")]
    DuplicateKey { entry: usize, key: String },
}

impl ParametersSyntaxError {
    /// 1-based number of the offending entry, if the error is tied to one.
    pub fn entry(&self) -> Option<usize> {
        match self {
            ParametersSyntaxError::Empty => None,
            ParametersSyntaxError::EmptyEntry { entry }
            | ParametersSyntaxError::MissingSeparator { entry, .. }
            | ParametersSyntaxError::EmptyKey { entry }
            | ParametersSyntaxError::DuplicateKey { entry, .. } => Some(*entry),
        }
    }
}

/// IIS settings the site executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownParameter {
    /// `logfile.directory`: folder the site writes its logs to
    LogDirectory,
    /// `logfile.period`: Hourly, Daily, Weekly, Monthly or MaxSize
    LogPeriod,
    /// `logfile.logFormat`: log format, W3C by default
    LogFormat,
    /// `logfile.truncateSize`: rollover size in bytes
    TruncateSize,
}

impl KnownParameter {
    pub const ALL: [KnownParameter; 4] = [
        KnownParameter::LogDirectory,
        KnownParameter::LogPeriod,
        KnownParameter::LogFormat,
        KnownParameter::TruncateSize,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            KnownParameter::LogDirectory => "logfile.directory",
            KnownParameter::LogPeriod => "logfile.period",
            KnownParameter::LogFormat => "logfile.logFormat",
            KnownParameter::TruncateSize => "logfile.truncateSize",
        }
    }

    /// Case-insensitive lookup; IIS configuration keys are not case sensitive.
    pub fn lookup(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|known| known.key().eq_ignore_ascii_case(key))
    }
}

/// Ordered `key -> value` pairs parsed from a `parameters` string.
///
/// Equality ignores order: `a:1|b:2` equals `b:2|a:1`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SiteParameters {
    entries: IndexMap<String, String>,
}

impl SiteParameters {
    /// Parse a `parameters` string.
    pub fn parse(input: &str) -> Result<Self, ParametersSyntaxError> {
        if input.is_empty() {
            return Err(ParametersSyntaxError::Empty);
        }

        let mut entries = IndexMap::new();
        for (index, raw) in input.split('|').enumerate() {
            let entry = index + 1;
            if raw.is_empty() {
                return Err(ParametersSyntaxError::EmptyEntry { entry });
            }

            let (key, value) = raw
                .split_once(':')
                .ok_or_else(|| ParametersSyntaxError::MissingSeparator {
                    entry,
                    text: raw.to_string(),
                })?;

            if key.is_empty() {
                return Err(ParametersSyntaxError::EmptyKey { entry });
            }
            if entries.contains_key(key) {
                return Err(ParametersSyntaxError::DuplicateKey {
                    entry,
                    key: key.to_string(),
                });
            }
            entries.insert(key.to_string(), value.to_string());
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value of a known IIS setting, whatever case the caller used for its key.
    pub fn known(&self, parameter: KnownParameter) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(parameter.key()))
            .map(|(_, value)| value.as_str())
    }

    /// Keys the executor is not known to understand, in input order.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|key| KnownParameter::lookup(key).is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for SiteParameters {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.entries.get(key) == Some(value))
    }
}

impl Eq for SiteParameters {}

impl FromStr for SiteParameters {
    type Err = ParametersSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SiteParameters {
    type Error = ParametersSyntaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SiteParameters> for String {
    fn from(parameters: SiteParameters) -> Self {
        parameters.to_string()
    }
}

impl fmt::Display for SiteParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}:{}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let params = SiteParameters::parse("logfile.directory:D:\\logs|logfile.period:Daily").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("logfile.directory"), Some("D:\\logs"));
        assert_eq!(params.get("logfile.period"), Some("Daily"));
    }

    #[test]
    fn test_value_may_be_empty() {
        let params = SiteParameters::parse("a:").unwrap();
        assert_eq!(params.get("a"), Some(""));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(SiteParameters::parse(""), Err(ParametersSyntaxError::Empty));
        assert_eq!(
            SiteParameters::parse("a:1||b:2"),
            Err(ParametersSyntaxError::EmptyEntry { entry: 2 })
        );
        assert_eq!(
            SiteParameters::parse("a:1|"),
            Err(ParametersSyntaxError::EmptyEntry { entry: 2 })
        );
        assert_eq!(
            SiteParameters::parse("|a:1"),
            Err(ParametersSyntaxError::EmptyEntry { entry: 1 })
        );
        assert_eq!(
            SiteParameters::parse("a:1|b"),
            Err(ParametersSyntaxError::MissingSeparator {
                entry: 2,
                text: "b".into()
            })
        );
        assert_eq!(
            SiteParameters::parse(":1"),
            Err(ParametersSyntaxError::EmptyKey { entry: 1 })
        );
        assert_eq!(
            SiteParameters::parse("a:1|a:2"),
            Err(ParametersSyntaxError::DuplicateKey {
                entry: 2,
                key: "a".into()
            })
        );
    }

    #[test]
    fn test_error_entry_numbers() {
        assert_eq!(ParametersSyntaxError::Empty.entry(), None);
        assert_eq!(SiteParameters::parse("x").unwrap_err().entry(), Some(1));
    }

    #[test]
    fn test_display_keeps_input_order() {
        let input = "logfile.period:Weekly|logfile.directory:C:\\inetpub\\logs";
        assert_eq!(SiteParameters::parse(input).unwrap().to_string(), input);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = SiteParameters::parse("a:1|b:2").unwrap();
        let b = SiteParameters::parse("b:2|a:1").unwrap();
        let c = SiteParameters::parse("a:1|b:3").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_known_parameters_case_insensitive() {
        let params = SiteParameters::parse("logFile.truncateSize:1048576|LOGFILE.LOGFORMAT:W3C").unwrap();
        assert_eq!(params.known(KnownParameter::TruncateSize), Some("1048576"));
        assert_eq!(params.known(KnownParameter::LogFormat), Some("W3C"));
        assert_eq!(params.known(KnownParameter::LogPeriod), None);
        assert_eq!(params.unknown_keys().count(), 0);
    }

    #[test]
    fn test_unknown_keys() {
        let params = SiteParameters::parse("foo:1|logfile.period:Daily|bar:2").unwrap();
        let unknown: Vec<&str> = params.unknown_keys().collect();
        assert_eq!(unknown, vec!["foo", "bar"]);
    }

    #[test]
    fn test_serde_as_string() {
        let params = SiteParameters::parse("a:1|b:2").unwrap();
        assert_eq!(serde_json::to_value(&params).unwrap(), serde_json::json!("a:1|b:2"));
        let back: SiteParameters = serde_json::from_value(serde_json::json!("a:1|b:2")).unwrap();
        assert_eq!(back, params);
        assert!(serde_json::from_value::<SiteParameters>(serde_json::json!("a")).is_err());
    }
}
