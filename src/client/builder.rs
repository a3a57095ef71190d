use crate::offline::{AssumeOnline, ConnectivityProbe};
use crate::queue::OfflineQueue;
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

use super::core::{spawn_replay_watcher, Client, ClientInner};

/// Builder for [`Client`] configuration.
///
/// Keep this surface small and predictable. Everything has a sensible
/// default: a pooled HTTP transport, an assume-online probe (which disables
/// offline deferral), and a fresh private queue.
pub struct ClientBuilder {
    base_url: Option<String>,
    default_headers: Vec<(String, String)>,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    queue: Option<Arc<OfflineQueue>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: Vec::new(),
            timeout: None,
            transport: None,
            probe: None,
            queue: None,
        }
    }

    /// Resolve relative request paths against this base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// A header applied to every request (the name is normalized).
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Per-attempt timeout for the default HTTP transport. Also settable via
    /// `REQUEUE_HTTP_TIMEOUT_SECS` (default 30s). Ignored when a custom
    /// transport is injected.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Inject a transport implementation (primarily for tests).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inject a connectivity probe. Without one the client assumes it is
    /// always online and never defers requests.
    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share an offline queue between clients. Each client otherwise owns a
    /// private queue.
    pub fn with_queue(mut self, queue: Arc<OfflineQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Build the client. Must be called from within a Tokio runtime when the
    /// probe supports reconnection notifications, since that spawns the
    /// replay loop.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.timeout)?),
        };
        let probe: Arc<dyn ConnectivityProbe> = self.probe.unwrap_or_else(|| Arc::new(AssumeOnline));
        let queue = self.queue.unwrap_or_default();

        let online_rx = probe.watch_online();
        let inner = Arc::new(ClientInner {
            transport,
            probe,
            queue,
            base_url: self.base_url,
            default_headers: self.default_headers,
            replay_enabled: online_rx.is_some(),
        });

        if let Some(rx) = online_rx {
            spawn_replay_watcher(&inner, rx);
        }

        Ok(Client::from_inner(inner))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
