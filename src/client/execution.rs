//! Single-attempt request execution: dispatch, load-end, defer-or-settle.

use crate::queue::QueuedRequest;
use crate::response::classify;
use crate::settle::RequestShared;
use crate::transport::{Progress, RawReply};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::core::ClientInner;

/// Drive one transport attempt for a logical request.
///
/// This is the path both first attempts and replays take. At load-end the
/// offline decision point runs first: when the probe supports notifications
/// and reports offline, the request is parked in the queue with its slot
/// still pending. Otherwise the reply is classified and the slot settled.
/// Settling an already-settled slot (e.g. a trailing load-end after cancel)
/// is a no-op by construction.
pub(crate) async fn run_attempt(inner: Arc<ClientInner>, shared: Arc<RequestShared>) {
    let start = Instant::now();
    let call = shared.plan.to_call();

    if let (Some(observer), Some(body)) = (&shared.plan.events.upload_progress, &call.body) {
        // Best-effort: reqwest hands the body to the connection whole, so a
        // single completed notification is all there is to report.
        observer(Progress {
            bytes: body.len() as u64,
            total: Some(body.len() as u64),
        });
    }

    let reply = match inner
        .transport
        .dispatch(call, shared.plan.events.download_progress.clone())
        .await
    {
        Ok(reply) => reply,
        // The call never reached the wire; classify it as a connection
        // failure rather than leaking a transport-level error.
        Err(error) => {
            debug!(
                request_id = shared.plan.request_id.as_str(),
                error = %error,
                "dispatch failed before the wire"
            );
            RawReply::connection_failed()
        }
    };

    // Load-end: the offline decision point.
    if inner.replay_enabled && !inner.probe.is_online() {
        inner.queue.push(QueuedRequest { shared });
        return;
    }

    let status = reply.status;
    let outcome = classify(reply, &shared.plan);
    match &outcome {
        Ok(_) => info!(
            http_status = status,
            request_id = shared.plan.request_id.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "request completed"
        ),
        Err(error) => info!(
            http_status = status,
            request_id = shared.plan.request_id.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            error = %error,
            "request failed"
        ),
    }
    shared.settle(outcome);
}
