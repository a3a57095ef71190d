//! The cancellable completion primitive.
//!
//! A [`CompletionSlot`] holds the single pending settlement of a logical
//! request. Resolve, reject, and cancel all funnel through one atomic
//! take-of-the-sender, so exactly one of them wins no matter how they race
//! or re-enter; the losers are silently ignored. A request deferred by the
//! offline queue keeps its slot pending, and replay settles the same slot,
//! so a caller already awaiting the handle observes eventual completion.

use crate::error::RequestError;
use crate::request::RequestPlan;
use crate::response::Response;
use crate::{Error, Result};
use reqwest::Method;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

type Outcome = Result<Response>;

/// Exactly-once settlement slot.
pub(crate) struct CompletionSlot {
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl CompletionSlot {
    fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Take the pending sender. The first caller wins; everyone after gets
    /// `None`. This is the single check-and-set the whole primitive relies on.
    pub fn take(&self) -> Option<oneshot::Sender<Outcome>> {
        self.tx.lock().ok()?.take()
    }

    pub fn is_settled(&self) -> bool {
        self.tx.lock().map(|tx| tx.is_none()).unwrap_or(true)
    }
}

/// State shared between the caller-facing handle, the in-flight dispatch
/// task, and (when deferred) the offline queue.
pub(crate) struct RequestShared {
    pub slot: CompletionSlot,
    pub plan: RequestPlan,
    abort: Mutex<Option<AbortHandle>>,
}

impl RequestShared {
    pub fn set_abort(&self, handle: AbortHandle) {
        if let Ok(mut abort) = self.abort.lock() {
            *abort = Some(handle);
        }
    }

    /// Settle with the given outcome, firing the matching lifecycle observer.
    /// A no-op when the slot is already settled.
    pub fn settle(&self, outcome: Outcome) {
        let Some(tx) = self.slot.take() else {
            return;
        };
        match &outcome {
            Ok(response) => {
                if let Some(observer) = &self.plan.events.complete {
                    observer(response);
                }
            }
            Err(error) => {
                if let Some(observer) = &self.plan.events.error {
                    observer(error);
                }
            }
        }
        // A dropped receiver means the caller discarded the handle without
        // awaiting it; that is the default no-op completion handler.
        let _ = tx.send(outcome);
    }

    /// Cancel: abort the in-flight transport call (at most once) and settle
    /// to a cancellation error. A no-op after settlement.
    pub fn cancel(&self) {
        let Some(tx) = self.slot.take() else {
            return;
        };
        if let Some(abort) = self.abort.lock().ok().and_then(|mut a| a.take()) {
            abort.abort();
        }
        debug!(request_id = self.plan.request_id.as_str(), "request cancelled");
        // Cancellation goes through the caller's error transformer like any
        // other classified failure.
        let error = match &self.plan.transformers.error {
            Some(f) => Error::Transformed(f(RequestError::cancelled())),
            None => Error::cancelled(),
        };
        if let Some(observer) = &self.plan.events.error {
            observer(&error);
        }
        let _ = tx.send(Err(error));
    }
}

/// Handle to one logical request.
///
/// The underlying transport call is dispatched eagerly, at the moment the
/// handle is created; awaiting [`response`](RequestHandle::response) only
/// observes completion. Cancelling after settlement is a no-op; cancelling
/// before settlement aborts the transport call and rejects with a
/// cancellation error.
pub struct RequestHandle {
    shared: Arc<RequestShared>,
    rx: oneshot::Receiver<Outcome>,
}

impl RequestHandle {
    pub(crate) fn new(plan: RequestPlan) -> (Self, Arc<RequestShared>) {
        let (tx, rx) = oneshot::channel();
        let shared = Arc::new(RequestShared {
            slot: CompletionSlot::new(tx),
            plan,
            abort: Mutex::new(None),
        });
        (
            Self {
                shared: Arc::clone(&shared),
                rx,
            },
            shared,
        )
    }

    /// Await completion of the request.
    pub async fn response(self) -> Result<Response> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // The sender lives in the shared state this handle owns, so it
            // cannot drop unsent; treat the impossible as a cancellation.
            Err(_) => Err(Error::cancelled()),
        }
    }

    /// Cancel the request. Safe to call at any time; only the first
    /// settlement (from any path) has effect.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// A detached, cloneable cancel action for use while the handle itself
    /// is being awaited.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.shared.slot.is_settled()
    }

    /// Correlation id of the underlying logical request.
    pub fn request_id(&self) -> &str {
        &self.shared.plan.request_id
    }

    pub fn method(&self) -> &Method {
        &self.shared.plan.method
    }

    pub fn url(&self) -> &str {
        &self.shared.plan.url
    }
}

/// Cancels the associated request; cloneable and safe to invoke repeatedly.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<RequestShared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_settled(&self) -> bool {
        self.shared.slot.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::Events;
    use crate::response::ResponseData;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response(status: u16) -> Response {
        Response {
            status,
            content_type: None,
            data: ResponseData::Empty,
        }
    }

    fn fresh() -> (RequestHandle, Arc<RequestShared>) {
        RequestHandle::new(RequestPlan::stub(Method::GET, "/test", Events::default()))
    }

    #[tokio::test]
    async fn test_first_settlement_wins_resolve_then_reject() {
        let (handle, shared) = fresh();
        shared.settle(Ok(response(200)));
        shared.settle(Err(Error::invalid("late")));
        shared.cancel();
        let resp = handle.response().await.unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_first_settlement_wins_reject_then_resolve() {
        let (handle, shared) = fresh();
        shared.settle(Err(Error::invalid("first")));
        shared.settle(Ok(response(200)));
        let err = handle.response().await.unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_cancel_before_any_result_rejects_cancelled() {
        let (handle, shared) = fresh();
        handle.cancel();
        assert!(shared.slot.is_settled());
        // A trailing load-end after cancel must be a no-op.
        shared.settle(Ok(response(200)));
        let err = handle.response().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_applies_error_transformer() {
        let mut plan = RequestPlan::stub(Method::GET, "/test", Events::default());
        plan.transformers.error =
            Some(Arc::new(|error| anyhow::anyhow!("mapped: {}", error.kind.message())));

        let (handle, shared) = RequestHandle::new(plan);
        shared.cancel();
        let err = handle.response().await.unwrap_err();
        match err {
            Error::Transformed(e) => {
                assert_eq!(e.to_string(), "mapped: Request was cancelled.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_after_settlement_is_noop() {
        let (handle, shared) = fresh();
        shared.settle(Ok(response(204)));
        let cancel = handle.cancel_handle();
        cancel.cancel();
        cancel.cancel();
        let resp = handle.response().await.unwrap();
        assert_eq!(resp.status, 204);
    }

    #[tokio::test]
    async fn test_observers_fire_exactly_once_with_settled_outcome() {
        let completions = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let (c, e) = (Arc::clone(&completions), Arc::clone(&errors));

        let mut events = Events::default();
        events.complete = Some(Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        events.error = Some(Arc::new(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        }));

        let (handle, shared) =
            RequestHandle::new(RequestPlan::stub(Method::GET, "/test", events));
        shared.settle(Ok(response(200)));
        shared.settle(Ok(response(201)));
        shared.cancel();
        handle.response().await.unwrap();

        assert_eq!(completions.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reentrant_cancel_from_error_observer() {
        // Cancel invoked synchronously from within a completion handler must
        // not deadlock or double-settle.
        let slot: Arc<Mutex<Option<CancelHandle>>> = Arc::new(Mutex::new(None));
        let reentrant = Arc::clone(&slot);

        let mut events = Events::default();
        events.error = Some(Arc::new(move |_| {
            if let Some(cancel) = reentrant.lock().unwrap().as_ref() {
                cancel.cancel();
            }
        }));

        let (handle, shared) =
            RequestHandle::new(RequestPlan::stub(Method::GET, "/test", events));
        *slot.lock().unwrap() = Some(handle.cancel_handle());

        shared.settle(Err(Error::invalid("boom")));
        let err = handle.response().await.unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }
}
