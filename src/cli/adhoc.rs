//! Ad-hoc runner: one module, many hosts.

use futures::stream::{self, StreamExt};
use iis_site::config::Config;
use iis_site::connection::LocalConnection;
use iis_site::inventory::{Host, Inventory};
use iis_site::modules::windows::site_executor::{ADDRESS_VAR, EXECUTOR_TIMEOUT_VAR, EXECUTOR_VAR};
use iis_site::modules::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleRegistry};
use iis_site::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::args::parse_module_args;
use super::output::{HostResult, OutputFormatter};
use super::Cli;

/// Everything the runner needs, resolved from CLI flags over configuration
pub struct AdHocRunner<'a> {
    cli: &'a Cli,
    config: &'a Config,
    registry: ModuleRegistry,
    pub output: OutputFormatter,
}

impl<'a> AdHocRunner<'a> {
    pub fn new(cli: &'a Cli, config: &'a Config) -> Self {
        Self {
            cli,
            config,
            registry: ModuleRegistry::with_builtins(),
            output: OutputFormatter::new(
                !cli.no_color && config.colors.enabled,
                cli.is_json(),
                cli.diff_mode,
            ),
        }
    }

    fn module_name(&self) -> &str {
        self.cli
            .module_name
            .as_deref()
            .unwrap_or(&self.config.defaults.module_name)
    }

    fn forks(&self) -> usize {
        self.cli.forks.unwrap_or(self.config.defaults.forks).max(1)
    }

    fn timeout(&self) -> u64 {
        self.cli
            .timeout
            .unwrap_or_else(|| self.config.executor_timeout())
    }

    fn load_inventory(&self) -> Result<Inventory> {
        let source = self.cli.inventory.clone().or_else(|| {
            self.config
                .defaults
                .inventory
                .as_ref()
                .map(|p| p.display().to_string())
        });

        match source {
            Some(source) => {
                debug!(source = %source, "Loading inventory");
                Ok(Inventory::from_source(&source)?)
            }
            None => Ok(Inventory::implicit_localhost()),
        }
    }

    /// Per-host context: merged inventory vars, configured defaults for the
    /// executor, and a local connection labelled with the host name.
    fn host_context(&self, inventory: &Inventory, host: &Host) -> ModuleContext {
        let mut vars = inventory.host_vars_json(host);
        if let Some(command) = &self.config.executor.command {
            vars.entry(EXECUTOR_VAR.to_string())
                .or_insert_with(|| Value::String(command.clone()));
        }
        vars.entry(EXECUTOR_TIMEOUT_VAR.to_string())
            .or_insert_with(|| json!(self.timeout()));
        vars.entry(ADDRESS_VAR.to_string())
            .or_insert_with(|| Value::String(host.address().to_string()));

        ModuleContext::new()
            .with_check_mode(self.cli.check_mode)
            .with_diff_mode(self.cli.diff_mode)
            .with_host(host.name.clone())
            .with_vars(vars)
            .with_connection(Arc::new(LocalConnection::with_identifier(host.name.clone())))
    }

    /// Print the module documentation.
    pub fn describe(&self) -> Result<i32> {
        let module = self.registry.require(self.module_name())?;
        let rendered = if self.output.is_json() {
            module.schema().to_json()?
        } else {
            module.schema().to_yaml()?
        };
        println!("{}", rendered.trim_end());
        Ok(0)
    }

    /// Validate once, then run the module on every matched host.
    pub async fn run(&self) -> Result<i32> {
        let module = self.registry.require(self.module_name())?;
        let params = parse_module_args(&self.cli.module_args)?;

        // Nothing is dispatched unless the arguments are valid.
        module.validate_params(&params)?;

        let inventory = self.load_inventory()?;
        let hosts = inventory.get_hosts_for_pattern(&self.cli.pattern)?;
        info!(
            module = module.name(),
            pattern = %self.cli.pattern,
            hosts = hosts.len(),
            check_mode = self.cli.check_mode,
            "Running module"
        );

        let contexts: Vec<(String, ModuleContext)> = hosts
            .iter()
            .map(|host| (host.name.clone(), self.host_context(&inventory, host)))
            .collect();

        let params = &params;
        let mut results: Vec<HostResult> = stream::iter(contexts)
            .map(|(host, context)| {
                let module = module.clone();
                async move {
                    let output = run_on_host(module.as_ref(), params, &context, &host).await;
                    HostResult { host, output }
                }
            })
            .buffer_unordered(self.forks())
            .collect()
            .await;
        results.sort_by(|a, b| a.host.cmp(&b.host));

        let rendered = self.output.render_results(&results);
        if self.output.is_json() {
            println!("{}", rendered);
        } else {
            print!("{}", rendered);
        }

        let failed = results.iter().filter(|r| r.output.failed).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some hosts failed");
            Ok(2)
        } else {
            Ok(0)
        }
    }
}

async fn run_on_host(
    module: &dyn Module,
    params: &iis_site::modules::ModuleParams,
    context: &ModuleContext,
    host: &str,
) -> ModuleOutput {
    match module.run(params, context).await {
        Ok(output) => output,
        Err(e) => {
            warn!(host = %host, error = %e, "Module failed");
            failure_output(&e)
        }
    }
}

/// Failed result for a host; executor failures keep their reason.
fn failure_output(error: &ModuleError) -> ModuleOutput {
    match error {
        ModuleError::Execution(failure) => ModuleOutput::failed(failure.message.clone())
            .with_data("reason", Value::String(failure.kind.to_string())),
        other => ModuleOutput::failed(other.to_string()),
    }
}
