//! Argument specifications for modules.
//!
//! A [`ModuleSchema`] is the immutable description of everything a module
//! accepts: option names, types, required-ness, allowed choices and the
//! version each option first appeared in. It is built once, shared behind an
//! `Arc`, and drives the generic half of parameter validation (unknown keys,
//! required fields, type coercion, choices). Module-specific checks run on the
//! [`NormalizedParams`] it produces.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::ModuleParams;

/// Parameters after generic validation, in schema order.
///
/// Only options the caller supplied (and that were not `null`) are present.
pub type NormalizedParams = IndexMap<String, serde_json::Value>;

/// Type of a module option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Free-form string. Numbers and booleans are coerced to their text form.
    Str,
    /// Integer. Accepts JSON integers, integral floats and decimal strings.
    Int,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Str => write!(f, "str"),
            ParamType::Int => write!(f, "int"),
        }
    }
}

/// List of allowed values, rendered comma separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceList(pub Vec<String>);

impl fmt::Display for ChoiceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// A single validation failure, tied to the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("value of {field} must be one of: {choices}, got: {value}")]
    InvalidChoice {
        field: String,
        value: String,
        choices: ChoiceList,
    },

    #[error("{field} must be of type {expected}: {message}")]
    InvalidType {
        field: String,
        expected: ParamType,
        message: String,
    },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("malformed {field}: {reason}")]
    MalformedParameters { field: String, reason: String },

    #[error("unsupported parameter: {field}")]
    UnsupportedParameter { field: String },
}

impl ValidationError {
    /// Name of the field this error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingRequiredField { field }
            | ValidationError::InvalidChoice { field, .. }
            | ValidationError::InvalidType { field, .. }
            | ValidationError::InvalidValue { field, .. }
            | ValidationError::MalformedParameters { field, .. }
            | ValidationError::UnsupportedParameter { field } => field,
        }
    }
}

/// Every validation failure found in one parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Names of the offending fields, in the order they were reported.
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(ValidationError::field).collect()
    }

    /// Turn an accumulated list into `Err` when anything was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Specification of one module option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    pub description: Vec<String>,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_added: Option<String>,
}

impl OptionSpec {
    pub fn new(param_type: ParamType) -> Self {
        Self {
            description: Vec::new(),
            param_type,
            required: false,
            choices: None,
            version_added: None,
        }
    }

    pub fn str() -> Self {
        Self::new(ParamType::Str)
    }

    pub fn int() -> Self {
        Self::new(ParamType::Int)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, line: impl Into<String>) -> Self {
        self.description.push(line.into());
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn added_in(mut self, version: impl Into<String>) -> Self {
        self.version_added = Some(version.into());
        self
    }

    /// Coerce a raw value into this option's type.
    fn coerce(&self, field: &str, value: &serde_json::Value) -> Result<serde_json::Value, ValidationError> {
        use serde_json::Value;

        let invalid = |message: String| ValidationError::InvalidType {
            field: field.to_string(),
            expected: self.param_type,
            message,
        };

        match self.param_type {
            ParamType::Str => match value {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(invalid(format!("cannot convert {} to a string", kind_of(other)))),
            },
            ParamType::Int => match value {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Ok(Value::from(i))
                    } else if let Some(u) = n.as_u64() {
                        Ok(Value::from(u))
                    } else {
                        match n.as_f64() {
                            Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(Value::from(f as i64)),
                            _ => Err(invalid(format!("'{}' is not an integer", n))),
                        }
                    }
                }
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| invalid(format!("'{}' cannot be converted to an int", s))),
                other => Err(invalid(format!("cannot convert {} to an int", kind_of(other)))),
            },
        }
    }
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}

/// Maturity and support level of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleMetadata {
    pub metadata_version: String,
    pub status: Vec<String>,
    pub supported_by: String,
}

impl Default for ModuleMetadata {
    fn default() -> Self {
        Self {
            metadata_version: "1.1".to_string(),
            status: vec!["preview".to_string()],
            supported_by: "community".to_string(),
        }
    }
}

/// Static description of a module and its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSchema {
    pub module: String,
    pub version_added: String,
    pub short_description: String,
    pub description: Vec<String>,
    pub options: IndexMap<String, OptionSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seealso: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<String>,
    pub metadata: ModuleMetadata,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub examples: String,
}

impl ModuleSchema {
    pub fn new(module: impl Into<String>, version_added: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            version_added: version_added.into(),
            short_description: String::new(),
            description: Vec::new(),
            options: IndexMap::new(),
            seealso: Vec::new(),
            author: Vec::new(),
            metadata: ModuleMetadata::default(),
            examples: String::new(),
        }
    }

    pub fn short_description(mut self, text: impl Into<String>) -> Self {
        self.short_description = text.into();
        self
    }

    pub fn describe(mut self, line: impl Into<String>) -> Self {
        self.description.push(line.into());
        self
    }

    /// Add an option. Options without their own `version_added` take the
    /// module's.
    pub fn option(mut self, name: impl Into<String>, mut spec: OptionSpec) -> Self {
        if spec.version_added.is_none() {
            spec.version_added = Some(self.version_added.clone());
        }
        self.options.insert(name.into(), spec);
        self
    }

    pub fn see_also(mut self, module: impl Into<String>) -> Self {
        self.seealso.push(module.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author.push(author.into());
        self
    }

    pub fn metadata(mut self, metadata: ModuleMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn examples(mut self, examples: impl Into<String>) -> Self {
        self.examples = examples.into();
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.options.get(name)
    }

    /// Names of the options that must be supplied.
    pub fn required_options(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Run the generic checks: unsupported keys, required options, types and
    /// choices. Every failure is collected rather than stopping at the first.
    pub fn check(&self, params: &ModuleParams) -> Result<NormalizedParams, ValidationErrors> {
        let (normalized, errors) = self.normalize(params);
        errors.into_result(normalized)
    }

    /// Like [`check`](Self::check), but also returns the options that did
    /// pass, so callers can keep validating them and report everything at once.
    pub fn normalize(&self, params: &ModuleParams) -> (NormalizedParams, ValidationErrors) {
        let mut errors = ValidationErrors::new();

        let mut unsupported: Vec<&String> = params
            .keys()
            .filter(|key| !self.options.contains_key(key.as_str()))
            .collect();
        unsupported.sort();
        for key in unsupported {
            errors.push(ValidationError::UnsupportedParameter { field: key.clone() });
        }

        let mut normalized = NormalizedParams::new();
        for (name, spec) in &self.options {
            let value = match params.get(name) {
                Some(serde_json::Value::Null) | None => None,
                Some(value) => Some(value),
            };

            let Some(value) = value else {
                if spec.required {
                    errors.push(ValidationError::MissingRequiredField { field: name.clone() });
                }
                continue;
            };

            let coerced = match spec.coerce(name, value) {
                Ok(coerced) => coerced,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            if spec.required && coerced.as_str().is_some_and(|s| s.trim().is_empty()) {
                errors.push(ValidationError::MissingRequiredField { field: name.clone() });
                continue;
            }

            if let Some(choices) = &spec.choices {
                let text = match &coerced {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if !choices.iter().any(|c| c == &text) {
                    errors.push(ValidationError::InvalidChoice {
                        field: name.clone(),
                        value: text,
                        choices: ChoiceList(choices.clone()),
                    });
                    continue;
                }
            }

            normalized.insert(name.clone(), coerced);
        }

        (normalized, errors)
    }

    /// Render the schema as YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Render the schema as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
