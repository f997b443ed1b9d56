//! Results subcommand implementations

use anyhow::{Context as _, Result};

use crate::cli::output;
use crate::cli::Context;
use crate::core::session::{ProvisioningSession, SessionState};
use crate::store::SessionStore;

use super::ResultsCommands;

fn summary(session: &ProvisioningSession) -> String {
    let p = &session.provision;
    let outcome = match (p.state, p.result) {
        (SessionState::Started, _) => "in progress".to_string(),
        (SessionState::Completed, true) => "ok".to_string(),
        (SessionState::Completed, false) => {
            format!("failed ({})", p.error_phase.as_deref().unwrap_or("unknown phase"))
        }
    };
    let duration = p
        .duration_ms
        .map(|ms| format!(" in {:.1}s", ms as f64 / 1000.0))
        .unwrap_or_default();
    format!(
        "{} {} {} [{}] {outcome}{duration}",
        session.serial, session.session_key, p.image, p.project
    )
}

/// Execute a results subcommand
pub fn execute(ctx: &Context, command: &ResultsCommands) -> Result<()> {
    let store =
        SessionStore::open(ctx.layout.results_path()).context("Failed to open session store")?;

    match command {
        ResultsCommands::List { serial } => {
            let sessions: Vec<ProvisioningSession> = match serial {
                Some(serial) => store.by_serial(serial)?,
                None => store
                    .all()?
                    .into_values()
                    .flat_map(|by_key| by_key.into_values())
                    .collect(),
            };
            if ctx.output.json {
                return output::print_json(&sessions);
            }
            if sessions.is_empty() {
                output::info("No provisioning sessions recorded.");
                return Ok(());
            }
            for session in &sessions {
                println!("{}", summary(session));
            }
        }
        ResultsCommands::Show { serial, key } => {
            let session = store.get(serial, key)?;
            if ctx.output.json {
                return output::print_json(&session);
            }
            println!("{}", summary(&session));
            if let Some(log) = &session.provision.error_log {
                println!();
                println!("{log}");
            }
        }
    }
    Ok(())
}
