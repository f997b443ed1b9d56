//! cmprovision CLI - network-boot provisioning server
//!
//! Entry point for the cmprovision command-line application.

use anyhow::Result;

use cmprovision::cli::output::{display_error, OutputConfig};
use cmprovision::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_with_metadata();

    // Initialize tracing subscriber; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(cli.log_level().into()),
        )
        .init();

    // Apply output configuration globally
    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);
    output_config.apply_global();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
