//! Graceful shutdown.
//!
//! On SIGINT or SIGTERM the coordinator walks through a fixed set of phases:
//!
//! 1. **Stop accepting**: the shared token is cancelled, so the HTTP server
//!    stops accepting and open device sessions close their sockets.
//! 2. **Draining**: wait until every WebSocket session has dropped its
//!    [`ConnectionGuard`], bounded by the drain timeout.
//! 3. **Stopping services**: registered [`ShutdownHandler`]s run, each bounded
//!    by the handler timeout.
//!
//! The whole sequence is bounded by `total_timeout`; past it the shutdown is
//! recorded as forced.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use strum::Display;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Pause after cancelling the token so listeners observe it
    pub stop_accepting_grace: Duration,
    /// Upper bound on waiting for open sessions
    pub drain_timeout: Duration,
    /// Upper bound on each registered handler
    pub handler_timeout: Duration,
    pub total_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self::from_secs(10)
    }
}

impl ShutdownConfig {
    /// Split a single operator-facing timeout across the phases.
    pub fn from_secs(total_secs: u64) -> Self {
        let total = Duration::from_secs(total_secs.max(1));
        Self {
            stop_accepting_grace: Duration::from_millis(100),
            drain_timeout: total.mul_f64(0.6),
            handler_timeout: total.mul_f64(0.3),
            total_timeout: total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ShutdownPhase {
    Running,
    StopAccepting,
    Draining,
    StoppingServices,
    Complete,
    Forced,
}

pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    phase: Mutex<ShutdownPhase>,
    token: CancellationToken,
    connections: Arc<AtomicU64>,
    handlers: Mutex<Vec<Arc<dyn ShutdownHandler>>>,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(ShutdownPhase::Running),
            token: CancellationToken::new(),
            connections: Arc::new(AtomicU64::new(0)),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    /// Token cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.lock()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Count one open connection until the guard is dropped.
    pub fn connection_guard(&self) -> ConnectionGuard {
        self.connections.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            connections: self.connections.clone(),
        }
    }

    pub fn active_connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn register(&self, handler: Arc<dyn ShutdownHandler>) {
        debug!(handler = handler.name(), "registered shutdown handler");
        self.handlers.lock().push(handler);
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        *self.phase.lock() = phase;
        debug!(%phase, "shutdown phase");
    }

    /// Resolve on SIGINT or SIGTERM.
    ///
    /// A signal handler that cannot be installed is logged and that signal is
    /// never observed.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = terminate => info!("received SIGTERM, shutting down"),
            _ = self.token.cancelled() => debug!("shutdown already requested"),
        }
    }

    /// Run every phase. Always leaves the token cancelled.
    pub async fn shutdown(&self) -> Result<()> {
        info!(
            connections = self.active_connection_count(),
            "starting graceful shutdown"
        );

        match timeout(self.config.total_timeout, self.run_phases()).await {
            Ok(()) => {
                self.set_phase(ShutdownPhase::Complete);
                info!("graceful shutdown complete");
            }
            Err(_) => {
                self.token.cancel();
                self.set_phase(ShutdownPhase::Forced);
                error!(
                    timeout_secs = self.config.total_timeout.as_secs(),
                    remaining_connections = self.active_connection_count(),
                    "graceful shutdown timed out"
                );
            }
        }
        Ok(())
    }

    async fn run_phases(&self) {
        self.set_phase(ShutdownPhase::StopAccepting);
        self.token.cancel();
        sleep(self.config.stop_accepting_grace).await;

        self.set_phase(ShutdownPhase::Draining);
        self.drain().await;

        self.set_phase(ShutdownPhase::StoppingServices);
        let handlers: Vec<_> = self.handlers.lock().clone();
        for handler in handlers {
            match timeout(self.config.handler_timeout, handler.shutdown()).await {
                Ok(Ok(())) => debug!(handler = handler.name(), "handler stopped"),
                Ok(Err(e)) => error!(handler = handler.name(), "shutdown handler failed: {}", e),
                Err(_) => warn!(handler = handler.name(), "shutdown handler timed out"),
            }
        }
    }

    async fn drain(&self) {
        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        loop {
            let active = self.active_connection_count();
            if active == 0 {
                info!("all sessions closed");
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining = active, "drain timeout reached");
                return;
            }
            debug!(active, "waiting for sessions to close");
            sleep(DRAIN_POLL).await;
        }
    }
}

/// Decrements the open connection count on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Arc<AtomicU64>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A component with work to finish before the process exits.
#[async_trait::async_trait]
pub trait ShutdownHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn shutdown(&self) -> Result<()>;
}

/// Waits for the mDNS responder task to observe cancellation and exit.
pub struct MdnsShutdownHandler {
    task: Mutex<Option<JoinHandle<crate::error::Result<()>>>>,
}

impl MdnsShutdownHandler {
    pub fn new(task: JoinHandle<crate::error::Result<()>>) -> Self {
        Self {
            task: Mutex::new(Some(task)),
        }
    }
}

#[async_trait::async_trait]
impl ShutdownHandler for MdnsShutdownHandler {
    fn name(&self) -> &'static str {
        "mdns"
    }

    async fn shutdown(&self) -> Result<()> {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await??;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct Flag(Arc<AtomicBool>);

    #[async_trait::async_trait]
    impl ShutdownHandler for Flag {
        fn name(&self) -> &'static str {
            "flag"
        }

        async fn shutdown(&self) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Stuck;

    #[async_trait::async_trait]
    impl ShutdownHandler for Stuck {
        fn name(&self) -> &'static str {
            "stuck"
        }

        async fn shutdown(&self) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn fast_config() -> ShutdownConfig {
        ShutdownConfig {
            stop_accepting_grace: Duration::from_millis(1),
            drain_timeout: Duration::from_millis(200),
            handler_timeout: Duration::from_millis(100),
            total_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn config_splits_total() {
        let config = ShutdownConfig::from_secs(10);
        assert_eq!(config.total_timeout, Duration::from_secs(10));
        assert_eq!(config.drain_timeout, Duration::from_secs(6));
        assert_eq!(config.handler_timeout, Duration::from_secs(3));
        assert_eq!(ShutdownConfig::from_secs(0).total_timeout, Duration::from_secs(1));
    }

    #[test]
    fn phase_names() {
        assert_eq!(ShutdownPhase::Running.to_string(), "running");
        assert_eq!(ShutdownPhase::StoppingServices.to_string(), "stopping_services");
        assert_eq!(ShutdownPhase::Forced.to_string(), "forced");
    }

    #[test]
    fn guards_track_connections() {
        let coordinator = ShutdownCoordinator::new(fast_config());
        let a = coordinator.connection_guard();
        let b = coordinator.connection_guard();
        assert_eq!(coordinator.active_connection_count(), 2);
        drop(a);
        assert_eq!(coordinator.active_connection_count(), 1);
        drop(b);
        assert_eq!(coordinator.active_connection_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_token_and_runs_handlers() {
        let coordinator = ShutdownCoordinator::new(fast_config());
        let ran = Arc::new(AtomicBool::new(false));
        coordinator.register(Arc::new(Flag(ran.clone())));
        let token = coordinator.token();

        assert_eq!(coordinator.phase(), ShutdownPhase::Running);
        coordinator.shutdown().await.unwrap();

        assert!(token.is_cancelled());
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(coordinator.phase(), ShutdownPhase::Complete);
    }

    #[tokio::test]
    async fn drain_waits_for_guards() {
        let coordinator = Arc::new(ShutdownCoordinator::new(ShutdownConfig {
            drain_timeout: Duration::from_secs(1),
            ..fast_config()
        }));
        let guard = coordinator.connection_guard();
        let token = coordinator.token();
        tokio::spawn(async move {
            token.cancelled().await;
            sleep(Duration::from_millis(20)).await;
            drop(guard);
        });

        coordinator.shutdown().await.unwrap();
        assert_eq!(coordinator.active_connection_count(), 0);
        assert_eq!(coordinator.phase(), ShutdownPhase::Complete);
    }

    #[tokio::test]
    async fn stuck_handler_does_not_block_exit() {
        let coordinator = ShutdownCoordinator::new(fast_config());
        coordinator.register(Arc::new(Stuck));
        coordinator.shutdown().await.unwrap();
        assert_eq!(coordinator.phase(), ShutdownPhase::Complete);
    }

    #[tokio::test]
    async fn total_timeout_forces() {
        let coordinator = ShutdownCoordinator::new(ShutdownConfig {
            drain_timeout: Duration::from_secs(5),
            total_timeout: Duration::from_millis(50),
            ..fast_config()
        });
        let _held = coordinator.connection_guard();
        coordinator.shutdown().await.unwrap();
        assert_eq!(coordinator.phase(), ShutdownPhase::Forced);
        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn mdns_handler_awaits_task() {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move {
            child.cancelled().await;
            Ok(())
        });
        let handler = MdnsShutdownHandler::new(task);
        token.cancel();
        handler.shutdown().await.unwrap();
        // second call is a no-op
        handler.shutdown().await.unwrap();
    }
}
