//! Parsing of the `-a` module argument string.
//!
//! Two forms are accepted:
//!
//! - `key=value` tokens split with shell quoting rules, e.g.
//!   `name='Default Web Site' state=started port=8080`
//! - a JSON object, e.g. `{"name": "acme", "port": 8080}`
//!
//! Backslashes are literal in the token form so that Windows paths such as
//! `physical_path=C:\sites\acme` survive unquoted. Values stay strings; the
//! module schema decides how to coerce them.

use iis_site::modules::ModuleParams;
use iis_site::{Error, Result};
use serde_json::Value;

/// Parse the `-a` argument into module parameters.
pub fn parse_module_args(input: &str) -> Result<ModuleParams> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(ModuleParams::new());
    }

    if trimmed.starts_with('{') {
        return parse_json_args(trimmed);
    }

    let words = shell_words::split(&protect_backslashes(trimmed))
        .map_err(|e| Error::ModuleArgs(format!("{}: {}", e, input)))?;

    let mut params = ModuleParams::new();
    for word in words {
        let (key, value) = word.split_once('=').ok_or_else(|| {
            Error::ModuleArgs(format!("expected key=value, got '{}'", word))
        })?;
        if key.is_empty() {
            return Err(Error::ModuleArgs(format!("missing key in '{}'", word)));
        }
        if params
            .insert(key.to_string(), Value::String(value.to_string()))
            .is_some()
        {
            return Err(Error::ModuleArgs(format!("duplicate argument '{}'", key)));
        }
    }

    Ok(params)
}

fn parse_json_args(input: &str) -> Result<ModuleParams> {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(_) => Err(Error::ModuleArgs("JSON arguments must be an object".into())),
        Err(e) => Err(Error::ModuleArgs(format!("invalid JSON arguments: {}", e))),
    }
}

/// Double every backslash outside single quotes, where shell_words would
/// otherwise treat it as an escape.
fn protect_backslashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_single = false;
    let mut in_double = false;

    for c in input.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '\\' if !in_single => out.push('\\'),
            _ => {}
        }
        out.push(c);
    }

    out
}
