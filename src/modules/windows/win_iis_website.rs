//! win_iis_website - Configures an IIS web site
//!
//! Creates, removes and configures an IIS web site. The module validates its
//! parameters, asks a [`SiteExecutor`] for the current state of the site,
//! then asks it to converge on the requested state and reports the result:
//!
//! ```json
//! {"changed": false, "site": {"ApplicationPool": "DefaultAppPool",
//!   "Bindings": ["*:80:"], "ID": 1, "Name": "Default Web Site",
//!   "PhysicalPath": "%SystemDrive%\\inetpub\\wwwroot", "State": "Stopped"}}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::site_executor::{ApplyRequest, ScriptExecutor, SiteExecutor};
use super::site_info::{Binding, SiteInfo};
use super::site_parameters::SiteParameters;
use super::{check_single_line, check_windows_path};
use crate::modules::schema::{
    ChoiceList, ModuleSchema, NormalizedParams, OptionSpec, ParamType, ValidationError,
    ValidationErrors,
};
use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult,
};

pub const MODULE_NAME: &str = "win_iis_website";

/// Desired state of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteState {
    Absent,
    Started,
    Stopped,
    Restarted,
}

impl SiteState {
    pub const CHOICES: [&'static str; 4] = ["absent", "started", "stopped", "restarted"];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteState::Absent => "absent",
            SiteState::Started => "started",
            SiteState::Stopped => "stopped",
            SiteState::Restarted => "restarted",
        }
    }
}

impl FromStr for SiteState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absent" => Ok(SiteState::Absent),
            "started" => Ok(SiteState::Started),
            "stopped" => Ok(SiteState::Stopped),
            "restarted" => Ok(SiteState::Restarted),
            _ => Err(ValidationError::InvalidChoice {
                field: "state".to_string(),
                value: s.to_string(),
                choices: ChoiceList(Self::CHOICES.iter().map(|c| c.to_string()).collect()),
            }),
        }
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, normalised parameters for one invocation.
///
/// Serialises back to the flat parameter mapping, omitting anything the
/// caller did not supply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SiteState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<SiteParameters>,
}

impl WebsiteParams {
    /// The binding these parameters ask for, if a port was given.
    /// A missing ip means all addresses and a missing hostname means none.
    pub fn binding(&self) -> Option<Binding> {
        self.port.map(|port| {
            Binding::new(
                self.ip.clone().unwrap_or_else(|| "*".to_string()),
                port,
                self.hostname.clone().unwrap_or_default(),
            )
        })
    }

    /// Flat parameter mapping equivalent to these parameters.
    pub fn to_params(&self) -> ModuleParams {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => ModuleParams::new(),
        }
    }
}

impl ModuleSchema {
    /// Argument specification of `win_iis_website`.
    pub fn win_iis_website() -> Self {
        ModuleSchema::new(MODULE_NAME, "2.0")
            .short_description("Configures a IIS Web site")
            .describe("Creates, Removes and configures a IIS Web site.")
            .option(
                "name",
                OptionSpec::str().required().describe("Names of web site."),
            )
            .option(
                "site_id",
                OptionSpec::str()
                    .describe("Explicitly set the IIS numeric ID for a site.")
                    .describe("Note that this value cannot be changed after the website has been created.")
                    .added_in("2.1"),
            )
            .option(
                "state",
                OptionSpec::str()
                    .describe("State of the web site")
                    .choices(SiteState::CHOICES),
            )
            .option(
                "physical_path",
                OptionSpec::str()
                    .describe("The physical path on the remote host to use for the new site.")
                    .describe("The specified folder must already exist."),
            )
            .option(
                "application_pool",
                OptionSpec::str().describe("The application pool in which the new site executes."),
            )
            .option(
                "port",
                OptionSpec::int().describe("The port to bind to / use for the new site."),
            )
            .option(
                "ip",
                OptionSpec::str().describe("The IP address to bind to / use for the new site."),
            )
            .option(
                "hostname",
                OptionSpec::str().describe("The host header to bind to / use for the new site."),
            )
            .option(
                "ssl",
                OptionSpec::str().describe("Enables HTTPS binding on the site."),
            )
            .option(
                "parameters",
                OptionSpec::str()
                    .describe(
                        "Custom site Parameters from string where properties are separated by a pipe \
                         and property name/values by colon Ex. \"foo:1|bar:2\"",
                    )
                    .describe("IIS Custom Parameters:")
                    .describe("logfile.directory - Physical Path to store Logs (ex: D:\\IIS-LOGs\\)")
                    .describe(
                        "logfile.period - Log File Rollover Schedule accepting these values: \
                         Hourly | Daily | Weekly | Monthly. How frequently the log file should be rolled-over.",
                    )
                    .describe("logfile.LogFormat - Log File format, by default IIS uses W3C")
                    .describe(
                        "logFile.truncateSize - the size at which the log file contents will be \
                         truncated expressed in bytes (20971520 bytes = 20 megabytes)",
                    ),
            )
            .see_also("win_iis_virtualdirectory")
            .see_also("win_iis_webapplication")
            .see_also("win_iis_webapppool")
            .see_also("win_iis_webbinding")
            .author("Henrik Wallström (@henrikwallstrom)")
            .examples(EXAMPLES)
    }
}

const EXAMPLES: &str = r#"# Start a website
- name: Acme IIS site
  win_iis_website:
    name: Acme
    state: started
    port: 80
    ip: 127.0.0.1
    hostname: acme.local
    application_pool: acme
    physical_path: C:\sites\acme
    parameters: logfile.directory:C:\sites\logs
  register: website

# Remove Default Web Site and the standard port 80 binding
- name: Remove Default Web Site
  win_iis_website:
    name: "Default Web Site"
    state: absent

# Create a site with custom log location and format, rolled over every hour
- name: Create shop site with custom logging
  win_iis_website:
    name: "MyCustom_Web_Shop_Site"
    state: started
    port: 80
    ip: '*'
    hostname: '*'
    physical_path: D:\wwwroot\websites\my-shop-site
    parameters: logfile.directory:D:\IIS-LOGS\websites\my-shop-site|logfile.period:Hourly|logFile.logFormat:W3C
    application_pool: my-shop-site

# Ad-hoc:
#   iis-site -i hosts -m win_iis_website -a "name='Default Web Site'" windows
#   iis-site -i hosts -m win_iis_website -a "name='Default Web Site' state=stopped" windows
#   iis-site -i hosts -m win_iis_website -a "name=acme physical_path=C:\\sites\\acme" windows
"#;

/// Validates raw parameters against the `win_iis_website` schema.
///
/// Holds no mutable state, so one validator can serve any number of
/// concurrent invocations.
#[derive(Debug, Clone)]
pub struct WebsiteValidator {
    schema: Arc<ModuleSchema>,
}

impl Default for WebsiteValidator {
    fn default() -> Self {
        Self::new(Arc::new(ModuleSchema::win_iis_website()))
    }
}

impl WebsiteValidator {
    pub fn new(schema: Arc<ModuleSchema>) -> Self {
        Self { schema }
    }

    /// The static schema: options, types, choices and version markers.
    pub fn describe(&self) -> &ModuleSchema {
        &self.schema
    }

    /// Check `params` and return the normalised set, or every problem found.
    pub fn validate(&self, params: &ModuleParams) -> Result<WebsiteParams, ValidationErrors> {
        let (normalized, mut errors) = self.schema.normalize(params);
        let text = |field: &str| normalized.get(field).and_then(|v| v.as_str()).map(str::to_string);

        let name = text("name").unwrap_or_default();
        if let Err(message) = check_single_line(&name) {
            errors.push(invalid_value("name", message));
        }

        let state = match text("state") {
            Some(value) => match value.parse::<SiteState>() {
                Ok(state) => Some(state),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };

        let site_id = text("site_id");
        if let Some(id) = &site_id {
            if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                errors.push(ValidationError::InvalidType {
                    field: "site_id".to_string(),
                    expected: ParamType::Int,
                    message: format!("'{}' is not a numeric site id", id),
                });
            }
        }

        let port = port_from(&normalized, &mut errors);

        let ip = text("ip");
        if let Some(ip) = &ip {
            if !is_bind_address(ip) {
                errors.push(invalid_value(
                    "ip",
                    format!("'{}' is neither '*' nor an IP address", ip),
                ));
            }
        }

        let physical_path = text("physical_path");
        if let Some(path) = &physical_path {
            if let Err(message) = check_windows_path(path) {
                errors.push(invalid_value("physical_path", message));
            }
        }

        let parameters = match text("parameters") {
            Some(raw) => match SiteParameters::parse(&raw) {
                Ok(parsed) => {
                    for key in parsed.unknown_keys() {
                        warn!(key = %key, "Unrecognised IIS site parameter, passing it through");
                    }
                    Some(parsed)
                }
                Err(e) => {
                    errors.push(ValidationError::MalformedParameters {
                        field: "parameters".to_string(),
                        reason: e.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        let validated = WebsiteParams {
            name,
            site_id,
            state,
            physical_path,
            application_pool: text("application_pool"),
            port,
            ip,
            hostname: text("hostname"),
            ssl: text("ssl"),
            parameters,
        };
        errors.into_result(validated)
    }
}

fn invalid_value(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn port_from(normalized: &NormalizedParams, errors: &mut ValidationErrors) -> Option<u16> {
    let value = normalized.get("port")?;
    let port = value
        .as_i64()
        .and_then(|n| u16::try_from(n).ok())
        .or_else(|| value.as_u64().and_then(|n| u16::try_from(n).ok()));
    if port.is_none() {
        errors.push(ValidationError::InvalidType {
            field: "port".to_string(),
            expected: ParamType::Int,
            message: format!("{} is outside the port range 0-65535", value),
        });
    }
    port
}

fn is_bind_address(ip: &str) -> bool {
    if ip == "*" {
        return true;
    }
    let bare = ip
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(ip);
    bare.parse::<IpAddr>().is_ok()
}

fn render_state(site: Option<&SiteInfo>) -> String {
    match site {
        Some(site) => serde_yaml::to_string(site).unwrap_or_else(|_| format!("{:?}\n", site)),
        None => "state: absent\n".to_string(),
    }
}

fn summarize(params: &WebsiteParams, site: Option<&SiteInfo>, changed: bool, check_mode: bool) -> String {
    let verb = match (changed, check_mode) {
        (true, true) => "would change",
        (true, false) => "changed",
        (false, _) => "unchanged",
    };
    match site {
        Some(site) => format!(
            "site '{}' {} (ID {}, {}, bindings: {})",
            site.name,
            verb,
            site.id,
            site.state,
            if site.bindings.is_empty() {
                "none".to_string()
            } else {
                site.bindings.join(", ")
            }
        ),
        None => format!("site '{}' {} (absent)", params.name, verb),
    }
}

/// Module for IIS web sites
pub struct WinIisWebsiteModule {
    validator: WebsiteValidator,
    executor: Option<Arc<dyn SiteExecutor>>,
}

impl Default for WinIisWebsiteModule {
    fn default() -> Self {
        Self::new()
    }
}

impl WinIisWebsiteModule {
    /// Module that builds a [`ScriptExecutor`] per invocation from the context.
    pub fn new() -> Self {
        Self {
            validator: WebsiteValidator::default(),
            executor: None,
        }
    }

    /// Module that always uses `executor`.
    pub fn with_executor(executor: Arc<dyn SiteExecutor>) -> Self {
        Self {
            validator: WebsiteValidator::default(),
            executor: Some(executor),
        }
    }

    pub fn validator(&self) -> &WebsiteValidator {
        &self.validator
    }

    fn executor_for(&self, context: &ModuleContext) -> ModuleResult<Arc<dyn SiteExecutor>> {
        match &self.executor {
            Some(executor) => Ok(executor.clone()),
            None => Ok(Arc::new(ScriptExecutor::from_context(context)?)),
        }
    }
}

#[async_trait]
impl Module for WinIisWebsiteModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn description(&self) -> &'static str {
        "Configures a IIS Web site"
    }

    fn schema(&self) -> &ModuleSchema {
        self.validator.describe()
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        self.validator.validate(params)?;
        Ok(())
    }

    async fn run(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let params = self.validator.validate(params)?;
        if let Some(binding) = params.binding() {
            debug!(site = %params.name, binding = %binding, "Requested binding");
        }

        let executor = self.executor_for(context)?;
        let before = executor.query_state(&params).await?;
        debug!(site = %params.name, exists = before.is_some(), "Queried site state");

        let request = ApplyRequest {
            params,
            check_mode: context.check_mode,
        };
        let outcome = executor.apply_state(&request).await?;

        if let Some(site) = &outcome.site {
            if let Err(e) = site.parsed_bindings() {
                warn!(site = %site.name, error = %e, "Executor reported a malformed binding");
            }
        }

        let msg = outcome.msg.clone().unwrap_or_else(|| {
            summarize(
                &request.params,
                outcome.site.as_ref(),
                outcome.changed,
                context.check_mode,
            )
        });
        info!(site = %request.params.name, changed = outcome.changed, "{}", msg);

        let mut output = if outcome.changed {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        };

        if let Some(site) = &outcome.site {
            let value = serde_json::to_value(site).map_err(|e| {
                ModuleError::InvalidParameter(format!("cannot encode site: {}", e))
            })?;
            output = output.with_data("site", value);
        }

        if context.diff_mode {
            output = output.with_diff(Diff::new(
                render_state(before.as_ref()),
                render_state(outcome.site.as_ref()),
            ));
        }

        Ok(output)
    }
}
