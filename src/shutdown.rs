//! Graceful shutdown coordination

use std::io;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info};

use crate::smtp::SessionRegistry;

/// Terminal outcome of a shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All sessions drained within the grace period
    Stopped,
    /// The grace period expired with sessions still in flight
    ForceStopped,
}

impl ShutdownOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Stopped => 0,
            ShutdownOutcome::ForceStopped => 1,
        }
    }
}

/// Drives the `Running -> Draining -> Stopped | ForceStopped` lifecycle.
///
/// Operator signals and unrecoverable errors both route here: the trigger
/// flips a watch flag the listener observes to stop accepting, then
/// [`ShutdownCoordinator::drain`] races the session registry against the
/// grace timer. The timer is cancelled automatically when draining wins.
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<bool>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the given grace period
    pub fn new(grace: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx, grace }
    }

    /// A receiver that flips to `true` once shutdown begins
    pub fn watcher(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop accepting new connections and wait for live sessions to finish.
    ///
    /// Returns [`ShutdownOutcome::Stopped`] if the registry drains within
    /// the grace period, [`ShutdownOutcome::ForceStopped`] otherwise.
    pub async fn drain(&self, registry: &SessionRegistry) -> ShutdownOutcome {
        let _ = self.shutdown_tx.send(true);

        let live = registry.len().await;
        info!(sessions = live, grace = ?self.grace, "draining");

        match timeout(self.grace, registry.wait_drained()).await {
            Ok(()) => {
                info!("server shut down cleanly");
                ShutdownOutcome::Stopped
            }
            Err(_) => {
                error!(
                    sessions = registry.len().await,
                    "grace period expired, forcing shutdown"
                );
                ShutdownOutcome::ForceStopped
            }
        }
    }
}

/// Wait for an operator termination signal (SIGINT or SIGTERM)
pub async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::SessionEntry;
    use std::sync::Arc;
    use std::time::SystemTime;

    fn entry() -> SessionEntry {
        SessionEntry {
            peer: "127.0.0.1:9999".parse().unwrap(),
            connected_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_watcher_observes_trigger() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let mut watcher = coordinator.watcher();
        assert!(!*watcher.borrow());

        let registry = SessionRegistry::new();
        coordinator.drain(&registry).await;

        watcher.changed().await.unwrap();
        assert!(*watcher.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_drain_within_grace() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let registry = Arc::new(SessionRegistry::new());
        registry.register(1, entry()).await;

        let finisher = {
            let registry = registry.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                registry.deregister(1).await;
            })
        };

        let outcome = coordinator.drain(&registry).await;
        assert_eq!(outcome, ShutdownOutcome::Stopped);
        assert_eq!(outcome.exit_code(), 0);
        finisher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_stop_after_grace_expiry() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let registry = Arc::new(SessionRegistry::new());
        // A session that never finishes
        registry.register(1, entry()).await;

        let outcome = coordinator.drain(&registry).await;
        assert_eq!(outcome, ShutdownOutcome::ForceStopped);
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_drain_with_no_sessions_is_immediate() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        let registry = SessionRegistry::new();

        let outcome = coordinator.drain(&registry).await;
        assert_eq!(outcome, ShutdownOutcome::Stopped);
    }
}
