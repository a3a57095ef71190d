//! # requeue
//!
//! An offline-aware HTTP request layer: ergonomic request construction,
//! eagerly-dispatched cancellable requests, and transparent replay of
//! requests issued while the client has no connectivity.
//!
//! ## Core behavior
//!
//! - **Eager dispatch**: every entry point puts its transport call in
//!   flight at invocation time; awaiting the returned handle only observes
//!   completion.
//! - **Exactly-once settlement**: resolve, reject, and cancel race safely;
//!   only the first wins, the rest are silently ignored.
//! - **Offline deferral**: a request finishing while the connectivity probe
//!   reports offline is parked in a FIFO queue instead of failing, and
//!   replayed in order once connectivity returns. The caller's handle
//!   settles with the replayed outcome.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use requeue::{Client, RequestOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> requeue::Result<()> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")
//!         .build()?;
//!
//!     let handle = client.post(
//!         "/items",
//!         RequestOptions::new()
//!             .header("content-type", "application/json")
//!             .body(json!({"name": "widget"})),
//!     );
//!
//!     let response = handle.response().await?;
//!     println!("{:?}", response.data);
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Entry points, lifecycle orchestration, replay loop |
//! | [`request`] | Query/header/body construction and per-request options |
//! | [`response`] | Response parsing and status classification |
//! | [`settle`] | The exactly-once completion primitive and request handles |
//! | [`queue`] | The FIFO offline retry queue |
//! | [`offline`] | Connectivity probing |
//! | [`transport`] | The transport seam and the `reqwest`-backed default |

pub mod client;
pub mod error;
pub mod offline;
pub mod queue;
pub mod request;
pub mod response;
pub mod settle;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::{Error, ErrorKind, RequestError};
pub use offline::{AssumeOnline, ConnectivityProbe, ConnectivityState};
pub use queue::OfflineQueue;
pub use request::{Query, QueryValue, RequestOptions, ResponseKind};
pub use response::{Response, ResponseData};
pub use settle::{CancelHandle, RequestHandle};
pub use transport::{HttpTransport, Progress, RawReply, Transport, TransportCall};

/// Re-exported HTTP method type.
pub use reqwest::Method;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
