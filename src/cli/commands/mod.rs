//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod project;
pub mod results;
pub mod serve;

use anyhow::Result;
use clap::Subcommand;

use super::Context;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the provisioning server
    Serve {
        /// Override the HTTP bind address from the settings file
        #[arg(long)]
        bind: Option<String>,

        /// Do not supervise the boot responder
        #[arg(long)]
        no_boot: bool,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Inspect provisioning results
    Results {
        #[command(subcommand)]
        command: ResultsCommands,
    },
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// List all projects
    List,

    /// Show one project
    Show {
        /// Project name
        name: String,
    },

    /// Create a project
    Create {
        /// Project name
        name: String,

        /// Image for devices up to 8 GiB (also the fallback)
        #[arg(long)]
        small: Option<String>,

        /// Image for devices up to 16 GiB
        #[arg(long)]
        medium: Option<String>,

        /// Image for larger devices
        #[arg(long)]
        large: Option<String>,

        /// Bootloader firmware to flash
        #[arg(long)]
        firmware: Option<String>,

        /// GPIO of the status LED
        #[arg(long)]
        status_led: Option<i32>,

        /// Status LED is lit when driven high
        #[arg(long, requires = "status_led")]
        led_active_high: bool,

        /// Make this the active project
        #[arg(long)]
        activate: bool,
    },

    /// Delete a project
    Delete {
        /// Project name
        name: String,
    },

    /// Make a project the active one
    Activate {
        /// Project name
        name: String,
    },
}

/// Results subcommands
#[derive(Subcommand, Debug)]
pub enum ResultsCommands {
    /// List sessions
    List {
        /// Only sessions of this device
        #[arg(long)]
        serial: Option<String>,
    },

    /// Show one session
    Show {
        /// Device serial
        serial: String,

        /// Session key
        key: String,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        match self {
            Self::Serve { bind, no_boot } => serve::execute(ctx, bind.clone(), *no_boot).await,
            Self::Project { command } => project::execute(ctx, command),
            Self::Results { command } => results::execute(ctx, command),
        }
    }
}
