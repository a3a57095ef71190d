//! Transport seam: one physical request/response exchange.
//!
//! The rest of the crate never touches `reqwest` directly; it hands a fully
//! built [`TransportCall`] to a [`Transport`] and gets back a [`RawReply`]
//! whose status feeds the central classifier. Connection-level failures are
//! reported as `status = 0` replies, not as errors, so that classification
//! stays in one place.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use std::sync::Arc;

pub use http::HttpTransport;

/// Download progress notification: bytes received so far and, when the
/// server advertised one, the total expected length.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub bytes: u64,
    pub total: Option<u64>,
}

/// Observer invoked per received body chunk.
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// A fully built call: final URL, normalized headers, encoded body.
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// The terminal outcome of a transport call (the load-end notification).
///
/// `opened` records whether the call ever reached the wire; a status of 0
/// means "cancelled" when it did not and "connection failure" when it did.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub opened: bool,
}

impl RawReply {
    /// A status-0 reply for a call that was opened but never completed.
    pub fn connection_failed() -> Self {
        Self {
            status: 0,
            content_type: None,
            body: Bytes::new(),
            opened: true,
        }
    }

    /// A status-0 reply for a call that was never opened.
    pub fn never_opened() -> Self {
        Self {
            status: 0,
            content_type: None,
            body: Bytes::new(),
            opened: false,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch the call and drive it to load-end.
    ///
    /// Implementations report connection failures as `status = 0` replies.
    /// An `Err` is reserved for calls that could not be constructed at all.
    async fn dispatch(
        &self,
        call: TransportCall,
        on_chunk: Option<ProgressFn>,
    ) -> Result<RawReply, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Other(String),
}
