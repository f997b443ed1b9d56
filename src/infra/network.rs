//! Host interface setup
//!
//! Assigns the server address to the device-facing interface with `ip`.

use std::path::PathBuf;

use tokio::process::Command;

use crate::error::NetworkError;

/// Whether `ip addr show` output lists `cidr`'s host address
///
/// Matches the full `inet <host>/` token so `10.0.0.1` does not match
/// `10.0.0.10`.
pub fn address_assigned(ip_output: &str, cidr: &str) -> bool {
    let host = cidr.split('/').next().unwrap_or(cidr);
    let needle = format!("inet {host}/");
    ip_output.lines().any(|line| line.trim_start().starts_with(&needle))
}

/// The device-facing network interface
#[derive(Debug, Clone)]
pub struct HostInterface {
    ip: PathBuf,
}

impl HostInterface {
    /// Locate `ip` in PATH
    pub fn locate() -> Result<Self, NetworkError> {
        Self::locate_tool("ip")
    }

    /// Locate an `ip`-compatible tool by name
    pub fn locate_tool(tool: &str) -> Result<Self, NetworkError> {
        let ip = which::which(tool).map_err(|_| NetworkError::ToolNotFound {
            tool: tool.to_string(),
        })?;
        Ok(Self { ip })
    }

    /// Ensure `cidr` is assigned to `iface` and the link is up
    pub async fn ensure_address(&self, iface: &str, cidr: &str) -> Result<(), NetworkError> {
        let shown = self.run(&["addr", "show", iface]).await;
        let assigned = shown.as_deref().is_ok_and(|out| address_assigned(out, cidr));

        if assigned {
            tracing::info!(iface = %iface, address = %cidr, "Address already assigned");
        } else {
            tracing::info!(iface = %iface, address = %cidr, "Assigning address");
            self.run(&["addr", "add", cidr, "dev", iface]).await?;
        }

        self.run(&["link", "set", iface, "up"]).await?;
        Ok(())
    }

    async fn run(&self, args: &[&str]) -> Result<String, NetworkError> {
        let command = format!("{} {}", self.ip.display(), args.join(" "));
        tracing::debug!(command = %command, "Running");

        let output = Command::new(&self.ip)
            .args(args)
            .output()
            .await
            .map_err(|e| NetworkError::CommandFailed {
                command: command.clone(),
                error: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(NetworkError::CommandFailed {
                command,
                error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
