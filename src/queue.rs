//! The offline retry queue.
//!
//! Requests whose load-end fires while the connectivity probe reports
//! offline are parked here instead of being settled. On reconnection the
//! owner drains the queue in FIFO order and redispatches each item through
//! the full request path, reusing the item's original completion slot so
//! that an already-awaiting caller observes eventual settlement.

use crate::settle::RequestShared;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One deferred request: the frozen plan and the still-pending completion
/// slot both live in the shared state.
pub(crate) struct QueuedRequest {
    pub shared: Arc<RequestShared>,
}

/// FIFO queue of deferred requests.
///
/// Injectable rather than ambient: each client owns (or shares) a queue
/// explicitly, so independent clients and tests stay isolated. Items leave
/// the queue only by being drained for replay; a queue dropped with items
/// still parked settles each of them as cancelled rather than losing them
/// silently.
#[derive(Default)]
pub struct OfflineQueue {
    items: Mutex<VecDeque<QueuedRequest>>,
    draining: AtomicBool,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, item: QueuedRequest) {
        if let Ok(mut items) = self.items.lock() {
            items.push_back(item);
            debug!(
                request_id = item_id(items.back()),
                queued = items.len(),
                "request deferred while offline"
            );
        }
    }

    /// Claim the drain. Returns false when a drain is already in progress;
    /// the active drain owns everything queued up to its snapshot, and
    /// whatever arrives later waits for the next reconnection signal.
    pub(crate) fn begin_drain(&self) -> bool {
        !self.draining.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn end_drain(&self) {
        self.draining.store(false, Ordering::SeqCst);
    }

    /// Take a snapshot of everything currently queued, leaving the live
    /// queue empty. Items re-deferred during the drain land behind the
    /// snapshot, i.e. at the tail, and are picked up by a later drain.
    pub(crate) fn take_all(&self) -> Vec<QueuedRequest> {
        match self.items.lock() {
            Ok(mut items) => items.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for OfflineQueue {
    fn drop(&mut self) {
        if let Ok(mut items) = self.items.lock() {
            for item in items.drain(..) {
                item.shared.cancel();
            }
        }
    }
}

fn item_id(item: Option<&QueuedRequest>) -> &str {
    item.map(|i| i.shared.plan.request_id.as_str()).unwrap_or("")
}
