//! Admission control for actions and the drain that follows a stop request.
//!
//! An action is admitted only while the server is `Ready`; each admitted
//! action holds an [`InFlightGuard`] until its transaction is released. After
//! `trigger_shutdown()` no action is admitted and `wait_for_drain()` waits for
//! the guards that are still out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;
use tracing::debug;

/// Server lifecycle as reported by `/health`.
///
/// Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    /// Refusing new actions while admitted ones finish.
    Draining,
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

#[derive(Debug, Default)]
struct ActionCounter {
    running: AtomicU64,
    idle: Notify,
}

#[derive(Debug)]
pub struct ShutdownController {
    state: ArcSwap<HealthState>,
    actions: Arc<ActionCounter>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(HealthState::Starting),
            actions: Arc::new(ActionCounter::default()),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    pub fn trigger_shutdown(&self) {
        self.state.store(Arc::new(HealthState::Draining));
        debug!(in_flight = self.in_flight_count(), "action admission closed");
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.state.load()
    }

    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.health_state() == HealthState::Ready
    }

    /// Admits one action, or `None` unless the server is `Ready`.
    ///
    /// The count is taken before the state is re-checked, so an action racing
    /// `trigger_shutdown()` is either refused or seen by `wait_for_drain()`.
    #[must_use]
    pub fn admit(&self) -> Option<InFlightGuard> {
        if !self.is_accepting() {
            return None;
        }
        let guard = self.in_flight_guard();
        self.is_accepting().then_some(guard)
    }

    fn in_flight_guard(&self) -> InFlightGuard {
        self.actions.running.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            actions: Arc::clone(&self.actions),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.actions.running.load(Ordering::SeqCst)
    }

    /// Waits up to `timeout` for admitted actions to finish.
    ///
    /// On success the state becomes `Stopped` and `true` is returned; on
    /// timeout the state stays `Draining`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                let notified = self.actions.idle.notified();
                if self.in_flight_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        let drained = tokio::time::timeout(timeout, idle).await.is_ok();
        if drained {
            self.state.store(Arc::new(HealthState::Stopped));
        }
        drained
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by one admitted action; dropping the last one wakes the drain.
#[derive(Debug)]
pub struct InFlightGuard {
    actions: Arc<ActionCounter>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.actions.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.actions.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_only_while_ready() {
        let controller = ShutdownController::new();
        assert_eq!(controller.health_state(), HealthState::Starting);
        assert!(controller.admit().is_none());

        controller.set_ready();
        let guard = controller.admit();
        assert!(guard.is_some());
        assert_eq!(controller.in_flight_count(), 1);

        controller.trigger_shutdown();
        assert_eq!(controller.health_state(), HealthState::Draining);
        assert!(controller.admit().is_none());
        assert_eq!(controller.in_flight_count(), 1);

        drop(guard);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn refused_admission_leaves_no_count() {
        let controller = ShutdownController::new();
        controller.set_ready();
        controller.trigger_shutdown();
        assert!(controller.admit().is_none());
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn state_names() {
        assert_eq!(HealthState::Starting.as_str(), "starting");
        assert_eq!(HealthState::Draining.as_str(), "draining");
        assert_eq!(HealthState::Stopped.as_str(), "stopped");
    }

    #[tokio::test]
    async fn idle_server_stops_at_once() {
        let controller = ShutdownController::new();
        controller.set_ready();
        controller.trigger_shutdown();

        assert!(controller.wait_for_drain(Duration::from_secs(1)).await);
        assert_eq!(controller.health_state(), HealthState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_admitted_actions() {
        let controller = ShutdownController::new();
        controller.set_ready();
        let first = controller.admit().unwrap();
        let second = controller.admit().unwrap();
        controller.trigger_shutdown();

        let finish = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(first);
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(second);
        });

        assert!(controller.wait_for_drain(Duration::from_secs(2)).await);
        assert_eq!(controller.health_state(), HealthState::Stopped);
        finish.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_on_stuck_action() {
        let controller = ShutdownController::new();
        controller.set_ready();
        let _stuck = controller.admit().unwrap();
        controller.trigger_shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
        assert_eq!(controller.health_state(), HealthState::Draining);
    }
}
