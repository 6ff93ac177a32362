//! iis-site - Declarative IIS web site management
//!
//! This is the main entry point for the iis-site CLI.

mod cli;

use anyhow::Result;
use cli::adhoc::AdHocRunner;
use cli::Cli;
use iis_site::config::Config;
use iis_site::logging::init_logging;

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}", e);
            Config::from_env()
        }
    };

    // Initialize logging based on verbosity
    init_logging(
        cli.verbosity(),
        config.logging.level.as_deref(),
        config.logging.format,
    );

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("iis-site v{} by {}", VERSION, AUTHORS);
    }

    let runner = AdHocRunner::new(&cli, &config);
    let result = if cli.describe {
        runner.describe()
    } else {
        runner.run().await
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            runner.output.error(&e.to_string());
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}
