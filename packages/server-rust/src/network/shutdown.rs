//! Health state machine and shutdown signal for the server.
//!
//! Uses `ArcSwap` for lock-free health state reads from probes and handlers,
//! and a `watch` channel so any holder of the controller can start shutdown.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Server health state, transitioned by the shutdown controller.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Listener bound, dispatch pool not yet running.
    Starting,
    /// Accepting workers and tasks.
    Ready,
    /// HTTP server and dispatch queue are draining; new tasks are refused.
    Draining,
    /// Dispatch pool stopped.
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinates shutdown across the server:
/// 1. Probes read `health_state()`
/// 2. `trigger_shutdown()` moves to Draining and wakes every receiver
/// 3. The network module drains HTTP, then the dispatch pool, then calls
///    `set_stopped()`
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    health_state: Arc<ArcSwap<HealthState>>,
}

impl ShutdownController {
    /// Creates a new shutdown controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            health_state: Arc::new(ArcSwap::from_pointee(HealthState::Starting)),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Returns a receiver that flips to `true` when shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Transitions to `Draining` and signals all shutdown receivers.
    pub fn trigger_shutdown(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        self.shutdown_signal.send_replace(true);
    }

    pub fn set_stopped(&self) {
        self.health_state.store(Arc::new(HealthState::Stopped));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_starting() {
        let controller = ShutdownController::new();
        assert_eq!(controller.health_state(), HealthState::Starting);
    }

    #[test]
    fn health_state_transitions_through_lifecycle() {
        let controller = ShutdownController::new();

        controller.set_ready();
        assert_eq!(controller.health_state(), HealthState::Ready);

        controller.trigger_shutdown();
        assert_eq!(controller.health_state(), HealthState::Draining);

        controller.set_stopped();
        assert_eq!(controller.health_state(), HealthState::Stopped);
        assert_eq!(controller.health_state().as_str(), "stopped");
    }

    #[tokio::test]
    async fn shutdown_receiver_notified() {
        let controller = ShutdownController::new();
        let mut rx = controller.shutdown_receiver();
        assert!(!*rx.borrow());

        controller.trigger_shutdown();

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn receiver_created_after_trigger_sees_shutdown() {
        let controller = ShutdownController::new();
        controller.trigger_shutdown();

        let mut rx = controller.shutdown_receiver();
        let seen = rx.wait_for(|stopped| *stopped).await.map(|v| *v);
        assert_eq!(seen.ok(), Some(true));
    }
}
