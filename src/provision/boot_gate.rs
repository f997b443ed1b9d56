//! Boot responder gate
//!
//! Runs the network-boot responder only while the catalog has an active
//! project. A supervising task polls the catalog, launches the responder once
//! a project becomes active, and relaunches it if it exits. Stopping kills the
//! exact child process the task launched.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::core::boot_config::{render_cmdline, render_dnsmasq_conf, BootConfig};
use crate::error::BootError;
use crate::infra::filesystem;
use crate::store::ProjectCatalog;

/// Observable supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BootStatus {
    /// Supervisor not running
    Stopped,
    /// Running, no active project yet (or responder exited)
    WaitingForProject,
    /// Responder process is up
    Serving { pid: Option<u32> },
}

/// How to launch the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ResponderCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// dnsmasq in the foreground with an explicit config file
    pub fn dnsmasq(binary: &str, conf_path: &std::path::Path) -> Self {
        Self::new(
            binary,
            [
                "--no-daemon".to_string(),
                format!("--conf-file={}", conf_path.display()),
            ],
        )
    }

    fn spawn(&self) -> Result<Child, BootError> {
        Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BootError::Spawn {
                program: self.program.clone(),
                error: e.to_string(),
            })
    }
}

/// A file the responder needs, written on every start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub content: String,
}

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct BootGateConfig {
    pub command: ResponderCommand,
    pub files: Vec<ConfigFile>,
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
}

impl BootGateConfig {
    /// dnsmasq configuration plus the device `cmdline.txt`
    pub fn from_settings(settings: &Settings) -> Self {
        let boot = &settings.boot;
        let tftp_root = boot.tftp_root.to_string_lossy();
        let dnsmasq_conf = render_dnsmasq_conf(&BootConfig {
            host_iface: &settings.server.host_iface,
            dhcp_range: &settings.server.dhcp_range,
            tftp_root: &tftp_root,
        });

        Self {
            command: ResponderCommand::dnsmasq(&boot.binary, &boot.conf_path),
            files: vec![
                ConfigFile {
                    path: boot.conf_path.clone(),
                    content: dnsmasq_conf,
                },
                ConfigFile {
                    path: boot.tftp_root.join("cmdline.txt"),
                    content: render_cmdline(settings.server.server_host()),
                },
            ],
            poll_interval: boot.poll_interval(),
            stop_timeout: boot.stop_timeout(),
        }
    }
}

#[derive(Debug)]
struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Starts and stops the boot responder around the active-project predicate
#[derive(Debug)]
pub struct BootGate {
    catalog: Arc<ProjectCatalog>,
    config: BootGateConfig,
    running: Mutex<Option<Running>>,
    status: watch::Sender<BootStatus>,
}

impl BootGate {
    pub fn new(catalog: Arc<ProjectCatalog>, config: BootGateConfig) -> Self {
        let (status, _) = watch::channel(BootStatus::Stopped);
        Self {
            catalog,
            config,
            running: Mutex::new(None),
            status,
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current supervisor state
    pub fn status(&self) -> BootStatus {
        *self.status.borrow()
    }

    /// Follow supervisor state changes
    pub fn watch_status(&self) -> watch::Receiver<BootStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    /// Write the responder configuration and start supervising
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), BootError> {
        let mut running = self.running();
        if running.is_some() {
            return Err(BootError::AlreadyRunning);
        }

        for file in &self.config.files {
            filesystem::write_file(&file.path, &file.content)?;
            tracing::debug!(path = %file.path.display(), "Wrote boot responder config");
        }

        let cancel = CancellationToken::new();
        let supervisor = Supervisor {
            catalog: Arc::clone(&self.catalog),
            command: self.config.command.clone(),
            poll_interval: self.config.poll_interval,
            cancel: cancel.clone(),
            status: self.status.clone(),
        };
        self.status.send_replace(BootStatus::WaitingForProject);
        let handle = tokio::spawn(supervisor.run());

        tracing::info!(program = %self.config.command.program, "Boot gate started");
        *running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Stop supervising and kill the responder
    ///
    /// Waits at most the configured stop timeout, then aborts the task; the
    /// child is killed when the aborted task drops it. No-op when stopped.
    pub async fn stop(&self) {
        let running = self.running().take();
        let Some(Running { cancel, mut handle }) = running else {
            return;
        };

        cancel.cancel();
        match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
            Ok(Ok(())) => tracing::info!("Boot gate stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Boot gate task failed"),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.stop_timeout.as_millis() as u64,
                    "Boot gate did not stop in time; aborting"
                );
                handle.abort();
                let _ = handle.await;
            }
        }
        self.status.send_replace(BootStatus::Stopped);
    }
}

struct Supervisor {
    catalog: Arc<ProjectCatalog>,
    command: ResponderCommand,
    poll_interval: Duration,
    cancel: CancellationToken,
    status: watch::Sender<BootStatus>,
}

impl Supervisor {
    async fn run(self) {
        loop {
            self.status.send_replace(BootStatus::WaitingForProject);
            if !self.wait_for_active_project().await {
                break;
            }

            let mut child = match self.command.spawn() {
                Ok(child) => child,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to launch boot responder; retrying");
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            let pid = child.id();
            tracing::info!(pid = ?pid, program = %self.command.program, "Boot responder started");
            self.status.send_replace(BootStatus::Serving { pid });

            let exit = tokio::select! {
                () = self.cancel.cancelled() => None,
                exit = child.wait() => Some(exit),
            };

            match exit {
                None => {
                    if let Err(e) = child.kill().await {
                        tracing::error!(pid = ?pid, error = %e, "Failed to kill boot responder");
                    } else {
                        tracing::info!(pid = ?pid, "Boot responder killed");
                    }
                    break;
                }
                Some(Ok(status)) => {
                    tracing::warn!(pid = ?pid, %status, "Boot responder exited");
                }
                Some(Err(e)) => {
                    tracing::error!(pid = ?pid, error = %e, "Failed waiting for boot responder");
                }
            }
            if !self.pause().await {
                break;
            }
        }
        self.status.send_replace(BootStatus::Stopped);
    }

    /// Poll until a project is active; `false` if cancelled first
    async fn wait_for_active_project(&self) -> bool {
        loop {
            let catalog = Arc::clone(&self.catalog);
            match tokio::task::spawn_blocking(move || catalog.active()).await {
                Ok(Ok(Some(project))) => {
                    tracing::info!(project = %project.name, "Active project found");
                    return true;
                }
                Ok(Ok(None)) => tracing::trace!("No active project"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed to read project catalog"),
                Err(e) => tracing::error!(error = %e, "Catalog poll task failed"),
            }
            if !self.pause().await {
                return false;
            }
        }
    }

    /// Sleep one poll interval; `false` if cancelled first
    async fn pause(&self) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}
