//! Connectivity probing.
//!
//! The request layer asks one question ("are we online right now?") at each
//! load-end, and optionally subscribes to reconnection notifications to
//! drive queue replay. Environments with no connectivity signal degrade to
//! "assume online, no notifications": every load-end is then terminal and
//! the queue is simply never populated.

use tokio::sync::watch;

pub trait ConnectivityProbe: Send + Sync {
    /// Whether the client currently has network connectivity.
    fn is_online(&self) -> bool;

    /// Subscribe to connectivity changes. `None` means this environment has
    /// no notifications, which disables deferral entirely.
    fn watch_online(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}

/// Degraded-but-correct fallback probe: always online, never notifies.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeOnline;

impl ConnectivityProbe for AssumeOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// A probe backed by an explicit online/offline flag, for integrations that
/// receive connectivity signals from the platform (and for tests).
pub struct ConnectivityState {
    tx: watch::Sender<bool>,
}

impl ConnectivityState {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Flip the connectivity flag. Transitions to online wake every
    /// subscribed replay loop.
    pub fn set_online(&self, online: bool) {
        // send_replace never fails; it does not depend on live receivers.
        self.tx.send_replace(online);
    }
}

impl ConnectivityProbe for ConnectivityState {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch_online(&self) -> Option<watch::Receiver<bool>> {
        Some(self.tx.subscribe())
    }
}
