//! Request construction: query assembly, header normalization, body encoding.
//!
//! Everything here runs once per logical request; the result is a frozen
//! [`RequestPlan`] that replays byte-for-byte if the request is deferred by
//! the offline queue.

use crate::error::RequestError;
use crate::response::Response;
use crate::transport::{Progress, TransportCall};
use crate::{Error, Result};
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Query parameters: a raw pre-formatted string, an ordered list of
/// key/value pairs, or a JSON object. Array values expand to repeated keys;
/// null values emit a bare key.
#[derive(Debug, Clone)]
pub enum Query {
    Raw(String),
    Pairs(Vec<(String, QueryValue)>),
    Json(Value),
}

#[derive(Debug, Clone)]
pub enum QueryValue {
    Single(String),
    List(Vec<String>),
    /// A bare key with no `=value` part.
    Flag,
}

impl From<&str> for Query {
    fn from(raw: &str) -> Self {
        Query::Raw(raw.to_string())
    }
}

impl From<Vec<(String, String)>> for Query {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Query::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k, QueryValue::Single(v)))
                .collect(),
        )
    }
}

/// Expected interpretation of the response body. Defaults to JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Json,
    Text,
    Bytes,
}

pub type CompleteFn = Arc<dyn Fn(&Response) + Send + Sync>;
pub type ErrorFn = Arc<dyn Fn(&Error) + Send + Sync>;
pub type ProgressObserver = Arc<dyn Fn(Progress) + Send + Sync>;

/// Event-style lifecycle observers. Each fires with the same outcome the
/// completion promise settles with, at settle time.
#[derive(Default, Clone)]
pub struct Events {
    pub complete: Option<CompleteFn>,
    pub error: Option<ErrorFn>,
    pub download_progress: Option<ProgressObserver>,
    pub upload_progress: Option<ProgressObserver>,
}

pub type BodyTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type ErrorTransform = Arc<dyn Fn(RequestError) -> anyhow::Error + Send + Sync>;

/// Caller-supplied transform hooks.
///
/// `response` runs over parsed success payloads, `error_response` over
/// parsed error payloads; the two never cross. `error` runs last, on every
/// failure path including cancellation, and may substitute an entirely
/// different error object.
#[derive(Default, Clone)]
pub struct Transformers {
    pub request: Option<BodyTransform>,
    pub response: Option<BodyTransform>,
    pub error_response: Option<BodyTransform>,
    pub error: Option<ErrorTransform>,
}

/// Per-request configuration. All fields optional.
#[derive(Default)]
pub struct RequestOptions {
    pub query: Option<Query>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub response_kind: ResponseKind,
    pub on: Events,
    pub transformers: Transformers,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn response_kind(mut self, kind: ResponseKind) -> Self {
        self.response_kind = kind;
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&Response) + Send + Sync + 'static) -> Self {
        self.on.complete = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on.error = Some(Arc::new(f));
        self
    }

    pub fn on_download_progress(mut self, f: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on.download_progress = Some(Arc::new(f));
        self
    }

    pub fn on_upload_progress(mut self, f: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on.upload_progress = Some(Arc::new(f));
        self
    }

    pub fn transform_request(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.transformers.request = Some(Arc::new(f));
        self
    }

    pub fn transform_response(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.transformers.response = Some(Arc::new(f));
        self
    }

    pub fn transform_error_response(
        mut self,
        f: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.transformers.error_response = Some(Arc::new(f));
        self
    }

    pub fn transform_error(
        mut self,
        f: impl Fn(RequestError) -> anyhow::Error + Send + Sync + 'static,
    ) -> Self {
        self.transformers.error = Some(Arc::new(f));
        self
    }
}

/// A frozen, replayable request: final URL, normalized headers, encoded
/// body. Replay builds a fresh [`TransportCall`] from the same plan so that
/// request identity (body, headers, transformers) is preserved exactly.
pub(crate) struct RequestPlan {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub response_kind: ResponseKind,
    pub events: Events,
    pub transformers: Transformers,
    pub request_id: String,
}

impl RequestPlan {
    /// Build a plan from caller options. On failure the caller's observers
    /// are handed back so the error path can still fire them.
    pub fn build(
        method: Method,
        url: &str,
        base_url: Option<&str>,
        default_headers: &[(String, String)],
        options: RequestOptions,
    ) -> std::result::Result<Self, (Error, Events)> {
        let url = build_url(join_base(base_url, url), options.query.as_ref());

        let mut headers: Vec<(String, String)> = default_headers
            .iter()
            .map(|(name, value)| (normalize_header_name(name), value.clone()))
            .collect();
        for (name, value) in &options.headers {
            headers.push((normalize_header_name(name), value.clone()));
        }

        let body = match options.body {
            Some(body) => {
                let body = match &options.transformers.request {
                    Some(f) => f(body),
                    None => body,
                };
                match encode_body(body) {
                    Ok(bytes) => Some(bytes),
                    Err(error) => return Err((error, options.on)),
                }
            }
            None => None,
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
            response_kind: options.response_kind,
            events: options.on,
            transformers: options.transformers,
            request_id: Uuid::new_v4().to_string(),
        })
    }

    /// A degenerate plan for requests that failed before dispatch; keeps the
    /// observers so the error path can still fire them.
    pub fn stub(method: Method, url: &str, events: Events) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            response_kind: ResponseKind::default(),
            events,
            transformers: Transformers::default(),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn to_call(&self) -> TransportCall {
        TransportCall {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

fn join_base(base_url: Option<&str>, url: &str) -> String {
    match base_url {
        Some(base) if !url.starts_with("http://") && !url.starts_with("https://") => {
            format!("{}{}", base.trim_end_matches('/'), url)
        }
        _ => url.to_string(),
    }
}

/// Append the query string, reusing an existing `?` and a trailing `&`
/// instead of inserting duplicates.
pub(crate) fn build_url(url: String, query: Option<&Query>) -> String {
    let Some(query) = query else {
        return url;
    };
    let qs = query_string(query);
    if qs.is_empty() {
        return url;
    }
    if url.contains('?') {
        if url.ends_with('&') {
            format!("{url}{qs}")
        } else {
            format!("{url}&{qs}")
        }
    } else {
        format!("{url}?{qs}")
    }
}

fn query_string(query: &Query) -> String {
    match query {
        Query::Raw(raw) => raw.clone(),
        Query::Pairs(pairs) => pairs
            .iter()
            .map(|(key, value)| pair_string(key, value))
            .collect::<Vec<_>>()
            .join("&"),
        Query::Json(value) => match value.as_object() {
            Some(map) => map
                .iter()
                .map(|(key, value)| pair_string(key, &json_query_value(value)))
                .collect::<Vec<_>>()
                .join("&"),
            None => String::new(),
        },
    }
}

fn json_query_value(value: &Value) -> QueryValue {
    match value {
        Value::Null => QueryValue::Flag,
        Value::Array(items) => QueryValue::List(items.iter().map(scalar_string).collect()),
        other => QueryValue::Single(scalar_string(other)),
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pair_string(key: &str, value: &QueryValue) -> String {
    match value {
        QueryValue::Single(v) => format!("{key}={v}"),
        QueryValue::List(items) => items
            .iter()
            .map(|v| format!("{key}={v}"))
            .collect::<Vec<_>>()
            .join("&"),
        QueryValue::Flag => key.to_string(),
    }
}

/// Normalize a header name to `Title-Case-With-Hyphens`.
pub(crate) fn normalize_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let lower = part.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Encode the request body. String bodies pass through as-is (a caller with
/// `Content-Type: application/json` and a pre-encoded string keeps it);
/// anything else serializes to JSON.
pub(crate) fn encode_body(body: Value) -> Result<Bytes> {
    match body {
        Value::String(s) => Ok(Bytes::from(s)),
        other => Ok(Bytes::from(serde_json::to_vec(&other)?)),
    }
}
