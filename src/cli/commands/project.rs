//! Project subcommand implementations
//!
//! Operates directly on the catalog document, so it works with or without a
//! running server.

use anyhow::{Context as _, Result};

use crate::cli::output;
use crate::cli::Context;
use crate::core::project::{ImageTier, Project};
use crate::store::ProjectCatalog;

use super::ProjectCommands;

fn open(ctx: &Context) -> Result<ProjectCatalog> {
    ProjectCatalog::open(ctx.layout.projects_path()).context("Failed to open project catalog")
}

fn print_project(project: &Project) {
    let marker = if project.active { "*" } else { " " };
    println!("{marker} {}", project.name);
    for tier in [ImageTier::Small, ImageTier::Medium, ImageTier::Large] {
        if let Some(image) = project.images.get(tier) {
            println!("    {tier:?}: {image}");
        }
    }
    if let Some(firmware) = &project.firmware {
        println!("    Firmware: {firmware}");
    }
    if project.has_status_led() {
        let polarity = if project.status_led_active_high {
            "active high"
        } else {
            "active low"
        };
        println!("    Status LED: GPIO {} ({polarity})", project.status_led_id);
    }
}

/// Execute a project subcommand
pub fn execute(ctx: &Context, command: &ProjectCommands) -> Result<()> {
    let catalog = open(ctx)?;

    match command {
        ProjectCommands::List => {
            let projects = catalog.list()?;
            if ctx.output.json {
                return output::print_json(&projects);
            }
            if projects.is_empty() {
                output::info("No projects defined.");
                return Ok(());
            }
            for project in &projects {
                print_project(project);
            }
        }
        ProjectCommands::Show { name } => {
            let project = catalog.get(name)?;
            if ctx.output.json {
                return output::print_json(&project);
            }
            print_project(&project);
        }
        ProjectCommands::Create {
            name,
            small,
            medium,
            large,
            firmware,
            status_led,
            led_active_high,
            activate,
        } => {
            let mut project = Project::new(name.clone()).with_active(*activate);
            for (tier, image) in [
                (ImageTier::Small, small),
                (ImageTier::Medium, medium),
                (ImageTier::Large, large),
            ] {
                if let Some(image) = image {
                    project = project.with_image(tier, image.clone());
                }
            }
            if let Some(firmware) = firmware {
                project = project.with_firmware(firmware.clone());
            }
            if let Some(gpio) = status_led {
                project = project.with_status_led(*gpio, *led_active_high);
            }

            let created = catalog.create(project)?;
            if ctx.output.json {
                return output::print_json(&created);
            }
            output::success(&format!("Created project '{}'", created.name));
        }
        ProjectCommands::Delete { name } => {
            catalog.delete(name)?;
            output::success(&format!("Deleted project '{name}'"));
        }
        ProjectCommands::Activate { name } => {
            catalog.set_active(name)?;
            output::success(&format!("Project '{name}' is now active"));
        }
    }
    Ok(())
}
