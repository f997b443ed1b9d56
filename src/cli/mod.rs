//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in [`crate::provision`] and
//! [`crate::store`].

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context as _, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use tracing::Level;

use crate::config::Settings;
use crate::infra::dirs::{DataLayout, ProvisionDirs, ENV_DATA_DIR};
use commands::Commands;
use output::OutputConfig;

/// Environment variable naming an explicit settings file
pub const ENV_CONFIG: &str = "CMPROVISION_CONFIG";

/// cmprovision - network-boot provisioning server for compute modules
///
/// Serves provisioning scripts to booting devices, records each device's
/// provisioning session and gates the boot responder on an active project.
#[derive(Parser, Debug)]
#[command(name = "cmprovision")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Data directory holding projects, results and uploads
    #[arg(long, global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Resolved settings and data location shared by all commands
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub layout: DataLayout,
    pub output: OutputConfig,
}

/// Version string with build metadata, shown by `--version`
pub fn long_version() -> &'static str {
    static LONG_VERSION: OnceLock<String> = OnceLock::new();
    LONG_VERSION.get_or_init(|| {
        let mut version = env!("CARGO_PKG_VERSION").to_string();
        if let Some(sha) = option_env!("VERGEN_GIT_SHA") {
            version.push_str(&format!(" ({sha})"));
        }
        if let Some(target) = option_env!("VERGEN_CARGO_TARGET_TRIPLE") {
            version.push_str(&format!("\ntarget: {target}"));
        }
        version
    })
}

impl Cli {
    /// Parse the process arguments
    pub fn parse_with_metadata() -> Self {
        let matches: ArgMatches = Self::command().long_version(long_version()).get_matches();
        match Self::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        }
    }

    /// Default tracing level for the chosen flags and command
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        let serving = matches!(self.command, Some(Commands::Serve { .. }));
        match (self.verbose, serving) {
            (0, false) => Level::WARN,
            (0, true) | (1, _) => Level::INFO,
            (2, _) => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    /// Load settings and resolve the data directory
    pub fn context(&self) -> Result<Context> {
        let dirs = ProvisionDirs::new();
        let settings = match &self.config {
            Some(path) => Settings::load_from_path(path),
            None => Settings::load(&dirs),
        }
        .context("Failed to load settings")?;

        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.storage.resolve_data_dir(&dirs));

        Ok(Context {
            settings,
            layout: DataLayout::new(data_dir),
            output: OutputConfig::new(self.quiet, self.json, self.verbose),
        })
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let Some(command) = self.command.as_ref() else {
            // No subcommand provided, show help
            let mut cmd = Self::command();
            cmd.print_help()?;
            return Ok(());
        };
        let ctx = self.context()?;
        command.run(&ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_follows_verbosity() {
        let cli = Cli::parse_from(["cmprovision", "project", "list"]);
        assert_eq!(cli.log_level(), Level::WARN);

        let cli = Cli::parse_from(["cmprovision", "-vv", "project", "list"]);
        assert_eq!(cli.log_level(), Level::DEBUG);

        let cli = Cli::parse_from(["cmprovision", "-q", "serve"]);
        assert_eq!(cli.log_level(), Level::ERROR);
    }

    #[test]
    fn test_serve_logs_info_by_default() {
        let cli = Cli::parse_from(["cmprovision", "serve"]);
        assert_eq!(cli.log_level(), Level::INFO);
    }

    #[test]
    fn test_long_version_starts_with_package_version() {
        assert!(long_version().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
