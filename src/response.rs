//! Classification of finished transport calls.
//!
//! Exactly one place turns a [`RawReply`] into either a success payload or a
//! typed error: callers never see raw status handling anywhere else.

use crate::error::{ErrorKind, RequestError};
use crate::request::{RequestPlan, ResponseKind};
use crate::transport::RawReply;
use crate::{Error, Result};
use bytes::Bytes;
use serde_json::Value;

/// The success payload of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    Text(String),
    Bytes(Bytes),
    /// No body (e.g. a DELETE acknowledged with an empty 2xx).
    Empty,
}

impl ResponseData {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseData::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseData::Empty)
    }
}

/// A successful response: parsed payload plus the raw status and content
/// type of the underlying transport call, for advanced inspection.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub data: ResponseData,
}

impl Response {
    /// Deserialize the JSON payload into a typed value.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            ResponseData::Json(value) => Ok(serde_json::from_value(value.clone())?),
            ResponseData::Text(text) => Ok(serde_json::from_str(text)?),
            _ => Err(Error::invalid("response carries no JSON payload")),
        }
    }
}

/// Classify a load-end into a success payload or a typed error, applying the
/// caller's transform hooks.
pub(crate) fn classify(reply: RawReply, plan: &RequestPlan) -> Result<Response> {
    if (200..400).contains(&reply.status) {
        let data = decode_data(&reply, plan);
        return Ok(Response {
            status: reply.status,
            content_type: reply.content_type,
            data,
        });
    }

    let payload = error_payload(&reply, plan);
    let error = RequestError::new(
        ErrorKind::from_status(reply.status, reply.opened),
        reply.status,
        payload,
    );
    match &plan.transformers.error {
        Some(f) => Err(Error::Transformed(f(error))),
        None => Err(error.into()),
    }
}

/// Decode a success body per the requested interpretation. JSON decoding is
/// keyed off the response content type as well, so a JSON reply to a
/// text-kind request still sniffs correctly on the error path.
fn decode_data(reply: &RawReply, plan: &RequestPlan) -> ResponseData {
    if reply.body.is_empty() {
        return ResponseData::Empty;
    }
    match plan.response_kind {
        ResponseKind::Bytes => ResponseData::Bytes(reply.body.clone()),
        ResponseKind::Text => ResponseData::Text(body_text(reply)),
        ResponseKind::Json => match parse_json(reply) {
            Some(value) => ResponseData::Json(apply_response_transform(value, plan)),
            // Parse failure is swallowed; surface the raw body instead.
            None => ResponseData::Text(body_text(reply)),
        },
    }
}

/// Best-effort error payload: parsed JSON when possible, the raw body text
/// otherwise, `None` when the body is empty. Only the error-payload
/// transform runs here; the success-response transform never touches
/// error bodies.
fn error_payload(reply: &RawReply, plan: &RequestPlan) -> Option<Value> {
    if reply.body.is_empty() {
        return None;
    }
    match parse_json(reply) {
        Some(value) => Some(match &plan.transformers.error_response {
            Some(f) => f(value),
            None => value,
        }),
        None => Some(Value::String(body_text(reply))),
    }
}

fn apply_response_transform(value: Value, plan: &RequestPlan) -> Value {
    match &plan.transformers.response {
        Some(f) => f(value),
        None => value,
    }
}

fn parse_json(reply: &RawReply) -> Option<Value> {
    let json_content_type = reply
        .content_type
        .as_deref()
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    if !json_content_type {
        return None;
    }
    serde_json::from_slice(&reply.body).ok()
}

fn body_text(reply: &RawReply) -> String {
    String::from_utf8_lossy(&reply.body).into_owned()
}
