//! CLI module for iis-site
//!
//! Ad-hoc style invocation: pick hosts from an inventory, validate the
//! module arguments once, then run the module against every matched host.

pub mod adhoc;
pub mod args;
pub mod output;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// iis-site - Declarative IIS web site management
///
/// Validates `win_iis_website` parameters and hands them to a site executor
/// for every host matching PATTERN.
#[derive(Parser, Debug, Clone)]
#[command(name = "iis-site")]
#[command(author = "iis-site Contributors")]
#[command(version)]
#[command(about = "Declarative IIS web site management", long_about = None)]
pub struct Cli {
    /// Host pattern to target (group, host, glob, `a:b`, `a:&b`, `a:!b`)
    #[arg(default_value = "all")]
    pub pattern: String,

    /// Inventory file, or a comma separated host list
    #[arg(short = 'i', long)]
    pub inventory: Option<String>,

    /// Module to run
    #[arg(short = 'm', long = "module-name")]
    pub module_name: Option<String>,

    /// Module arguments (key=value tokens or a JSON object)
    #[arg(short = 'a', long = "args", default_value = "")]
    pub module_args: String,

    /// Run in check mode (dry-run, don't make changes)
    #[arg(long = "check")]
    pub check_mode: bool,

    /// Show before/after differences
    #[arg(long = "diff")]
    pub diff_mode: bool,

    /// Number of hosts handled in parallel
    #[arg(short = 'f', long)]
    pub forks: Option<usize>,

    /// Executor timeout in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Path to configuration file
    #[arg(short = 'c', long, env = "IIS_SITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the module documentation and exit
    #[arg(long)]
    pub describe: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
