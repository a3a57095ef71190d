use crate::offline::ConnectivityProbe;
use crate::queue::OfflineQueue;
use crate::request::{RequestOptions, RequestPlan};
use crate::settle::RequestHandle;
use crate::transport::Transport;
use reqwest::Method;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use super::execution;

/// Offline-aware HTTP client.
///
/// Every entry point dispatches its transport call **eagerly**: the call is
/// on the wire (well, spawned onto the runtime) before the returned
/// [`RequestHandle`] is ever awaited. Requests completing while the
/// connectivity probe reports offline are deferred into the client's queue
/// and replayed, in order, when connectivity returns.
///
/// Cloning is cheap; clones share the transport, probe, and queue. Entry
/// points must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub transport: Arc<dyn Transport>,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub queue: Arc<OfflineQueue>,
    pub base_url: Option<String>,
    pub default_headers: Vec<(String, String)>,
    /// False when the probe has no notifications: deferral is disabled and
    /// every load-end is terminal (the degraded-but-correct fallback).
    pub replay_enabled: bool,
}

impl Client {
    pub fn builder() -> super::ClientBuilder {
        super::ClientBuilder::new()
    }

    /// Build a client with default configuration.
    pub fn new() -> crate::Result<Self> {
        Self::builder().build()
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    /// The queue holding requests deferred while offline.
    pub fn offline_queue(&self) -> &Arc<OfflineQueue> {
        &self.inner.queue
    }

    /// Dispatch a request. Returns immediately with a handle; the transport
    /// call is already in flight.
    pub fn request(&self, method: Method, url: &str, options: RequestOptions) -> RequestHandle {
        let plan = RequestPlan::build(
            method.clone(),
            url,
            self.inner.base_url.as_deref(),
            &self.inner.default_headers,
            options,
        );
        match plan {
            Ok(plan) => {
                debug!(
                    method = %plan.method,
                    url = plan.url.as_str(),
                    request_id = plan.request_id.as_str(),
                    "dispatching request"
                );
                let (handle, shared) = RequestHandle::new(plan);
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(execution::run_attempt(inner, Arc::clone(&shared)));
                shared.set_abort(task.abort_handle());
                handle
            }
            Err((error, events)) => {
                let (handle, shared) = RequestHandle::new(RequestPlan::stub(method, url, events));
                shared.settle(Err(error));
                handle
            }
        }
    }

    pub fn get(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::GET, url, options)
    }

    pub fn post(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::POST, url, options)
    }

    pub fn put(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::PUT, url, options)
    }

    pub fn patch(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::PATCH, url, options)
    }

    pub fn delete(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::DELETE, url, options)
    }

    pub fn head(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::HEAD, url, options)
    }

    pub fn options(&self, url: &str, options: RequestOptions) -> RequestHandle {
        self.request(Method::OPTIONS, url, options)
    }
}

impl ClientInner {
    /// Drain the offline queue: replay every deferred request, in the order
    /// it was enqueued. Only one drain runs at a time; a reconnection signal
    /// arriving mid-drain is absorbed (the active drain already owns the
    /// snapshot, and re-deferred items wait at the tail for the next one).
    pub(crate) async fn drain_queue(self: &Arc<Self>) {
        if !self.queue.begin_drain() {
            return;
        }
        let batch = self.queue.take_all();
        if !batch.is_empty() {
            info!(replaying = batch.len(), "connectivity restored, replaying deferred requests");
        }
        for item in batch {
            let shared = item.shared;
            if shared.slot.is_settled() {
                // Cancelled while deferred: skip the replay entirely.
                debug!(
                    request_id = shared.plan.request_id.as_str(),
                    "skipping replay of settled request"
                );
                continue;
            }
            let inner = Arc::clone(self);
            let task = tokio::spawn(execution::run_attempt(inner, Arc::clone(&shared)));
            shared.set_abort(task.abort_handle());
            // Let the replay reach its dispatch before dequeuing the next
            // item, and never spin through a reconnection storm unyielding.
            tokio::task::yield_now().await;
        }
        self.queue.end_drain();
    }
}

/// Replay loop: waits for offline→online transitions and drains the queue.
/// Holds only a weak reference so a dropped client shuts the loop down.
pub(crate) fn spawn_replay_watcher(inner: &Arc<ClientInner>, mut rx: watch::Receiver<bool>) {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if !*rx.borrow_and_update() {
                continue;
            }
            match weak.upgrade() {
                Some(inner) => inner.drain_queue().await,
                None => break,
            }
        }
    });
}
