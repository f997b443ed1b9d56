//! `cmprovision serve`

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::net::TcpListener;

use crate::cli::Context;
use crate::http::{create_router, serve, AppState};
use crate::infra::artifacts::ArtifactStore;
use crate::infra::network::HostInterface;
use crate::provision::{BootGate, BootGateConfig, LiveUpdateHub, Provisioner};
use crate::store::Stores;

/// Address devices use to reach the server
fn public_address(host: &str, port: u16) -> String {
    if port == 80 {
        host.to_string()
    } else {
        format!("{host}:{port}")
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("Shutdown requested");
}

/// Execute the serve command
pub async fn execute(ctx: &Context, bind: Option<String>, no_boot: bool) -> Result<()> {
    let settings = &ctx.settings;

    if settings.server.manage_interface {
        let iface = HostInterface::locate()?;
        iface
            .ensure_address(&settings.server.host_iface, &settings.server.server_ip)
            .await
            .with_context(|| format!("Failed to configure {}", settings.server.host_iface))?;
    }

    let stores = Stores::open(&ctx.layout).context("Failed to open data directory")?;
    let artifacts = ArtifactStore::new(ctx.layout.uploads_dir());
    let provisioner = Provisioner::new(
        Arc::clone(&stores.catalog),
        Arc::clone(&stores.sessions),
        LiveUpdateHub::new(),
    );

    let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    let port = listener.local_addr()?.port();

    let mut state = AppState::new(
        provisioner,
        artifacts,
        public_address(settings.server.server_host(), port),
    );

    let gate = if settings.boot.enabled && !no_boot {
        let gate = Arc::new(BootGate::new(
            Arc::clone(&stores.catalog),
            BootGateConfig::from_settings(settings),
        ));
        gate.start().context("Failed to start boot responder supervision")?;
        state = state.with_boot_gate(Arc::clone(&gate));
        Some(gate)
    } else {
        tracing::info!("Boot responder supervision disabled");
        None
    };

    tracing::info!(
        data_dir = %ctx.layout.root().display(),
        public_address = %state.public_address,
        "Provisioning server starting"
    );
    let served = serve(listener, create_router(state), shutdown_signal()).await;

    if let Some(gate) = gate {
        gate.stop().await;
    }
    served.context("HTTP server failed")
}
