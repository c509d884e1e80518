pub mod config;
pub mod device;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod page;
pub mod routes;
pub mod server;
pub mod shell;
pub mod shutdown;
pub mod state;

pub use config::{CliArgs, ServerConfig};
pub use error::{DiagnosticsError, ErrorCode};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use server::build_router;
pub use shell::{AppShell, BuildStamp, ContentProvider, Node, UpdateNotifier};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};

use anyhow::{Context, Result};
use device::mdns::MdnsResponder;
use shutdown::MdnsShutdownHandler;
use state::{AppState, MdnsStatus};
use std::{future::IntoFuture, sync::Arc};
use tokio::{net::TcpListener, time::timeout};

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let coordinator = Arc::new(ShutdownCoordinator::new(ShutdownConfig::from_secs(
        config.graceful_shutdown_timeout_secs,
    )));
    let state = Arc::new(AppState::new(config.clone(), coordinator.clone())?);

    tracing::info!(
        build_stamp = %config.build_stamp,
        update_state = %config.update_state,
        hostname = %config.device.mdns_name(),
        ssid = %config.device.ssid,
        auth = ?config.device.auth_mode(),
        "starting Open Car Diagnostics server",
    );

    if config.mdns_enabled {
        start_mdns(&config, &state, &coordinator).await;
    }

    let listener = TcpListener::bind(config.http_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_address))?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(transport = "http", bind = %actual_addr, "listening");

    let router = build_router(state.clone());
    let server = tokio::spawn(
        axum::serve(listener, router)
            .with_graceful_shutdown(coordinator.token().cancelled_owned())
            .into_future(),
    );

    coordinator.wait_for_signal().await;
    coordinator.shutdown().await?;

    match timeout(coordinator.config().total_timeout, server).await {
        Ok(joined) => joined
            .context("HTTP server task panicked")?
            .context("HTTP server failed"),
        Err(_) => {
            tracing::warn!("HTTP server did not stop in time, abandoning open connections");
            Ok(())
        }
    }
}

/// Bind and spawn the mDNS responder. A failure leaves the HTTP side running
/// and is reported through health checks.
async fn start_mdns(config: &ServerConfig, state: &Arc<AppState>, coordinator: &ShutdownCoordinator) {
    let Some(address) = config.mdns_address else {
        let error = DiagnosticsError::Config("mDNS enabled without an address".into());
        error.track();
        state.set_mdns_status(MdnsStatus::Failed(error.to_string()));
        return;
    };

    let socket = match MdnsResponder::bind(config.mdns_bind_address).await {
        Ok(socket) => socket,
        Err(error) => {
            error.track();
            tracing::error!(
                bind = %config.mdns_bind_address,
                "failed to start mDNS responder: {}", error
            );
            state.set_mdns_status(MdnsStatus::Failed(error.to_string()));
            return;
        }
    };

    let responder = MdnsResponder::new(&config.device.hostname, address);
    let token = coordinator.token();
    let task_state = state.clone();
    state.set_mdns_status(MdnsStatus::Running);
    let task = tokio::spawn(async move {
        let result = responder.run(socket, token).await;
        let status = match &result {
            Ok(()) => MdnsStatus::Stopped,
            Err(error) => {
                error.track();
                MdnsStatus::Failed(error.to_string())
            }
        };
        task_state.set_mdns_status(status);
        result
    });

    coordinator.register(Arc::new(MdnsShutdownHandler::new(task)));
}
