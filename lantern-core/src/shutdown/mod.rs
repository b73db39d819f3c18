//! Shutdown coordination
//!
//! Deferred work (scheduled reports) listens here and is dropped instead of
//! run once shutdown starts.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Shutdown,
}

/// Coordinates shutdown across tasks
#[derive(Debug)]
pub struct ShutdownCoordinator {
    state_tx: watch::Sender<ShutdownState>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// `grace` is how long `shutdown()` waits after signalling before it
    /// reports completion
    pub fn new(grace: Duration) -> Self {
        let (state_tx, _) = watch::channel(ShutdownState::Running);
        Self { state_tx, grace }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            state_rx: self.state_tx.subscribe(),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state_tx.borrow()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state() != ShutdownState::Running
    }

    /// Signal listeners, wait out the grace period, then mark shutdown done
    pub async fn shutdown(&self) {
        if !self.begin(ShutdownState::ShuttingDown) {
            warn!("Shutdown already in progress");
            return;
        }
        info!(grace_ms = self.grace.as_millis() as u64, "Initiating graceful shutdown");

        tokio::time::sleep(self.grace).await;
        self.state_tx.send_replace(ShutdownState::Shutdown);
        info!("Shutdown complete");
    }

    /// Signal listeners and mark shutdown done without waiting
    pub fn shutdown_immediately(&self) {
        if self.begin(ShutdownState::Shutdown) {
            warn!("Immediate shutdown");
        }
    }

    // Only the first caller moves the state away from Running
    fn begin(&self, next: ShutdownState) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

/// Receiving side handed to tasks
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    state_rx: watch::Receiver<ShutdownState>,
}

impl ShutdownListener {
    pub fn is_shutdown(&self) -> bool {
        *self.state_rx.borrow() != ShutdownState::Running
    }

    /// Resolves once shutdown has started. Also resolves if the coordinator
    /// was dropped.
    pub async fn wait(&mut self) {
        let _ = self
            .state_rx
            .wait_for(|state| *state != ShutdownState::Running)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_graceful_shutdown_walks_states() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(100));
        assert_eq!(coordinator.state(), ShutdownState::Running);

        coordinator.shutdown().await;
        assert_eq!(coordinator.state(), ShutdownState::Shutdown);

        // Second call is a no-op
        coordinator.shutdown().await;
        assert_eq!(coordinator.state(), ShutdownState::Shutdown);
    }

    #[tokio::test]
    async fn test_listener_wakes_on_shutdown() {
        let coordinator = ShutdownCoordinator::default();
        let mut listener = coordinator.subscribe();
        assert!(!listener.is_shutdown());

        let waiter = tokio::spawn(async move {
            listener.wait().await;
            listener.is_shutdown()
        });

        coordinator.shutdown_immediately();
        assert!(waiter.await.unwrap());
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_shutdown() {
        let coordinator = ShutdownCoordinator::default();
        coordinator.shutdown_immediately();

        let mut listener = coordinator.subscribe();
        assert!(listener.is_shutdown());
        listener.wait().await;
    }
}
