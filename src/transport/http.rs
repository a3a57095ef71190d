use super::{Progress, ProgressFn, RawReply, Transport, TransportCall, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Proxy;
use std::env;
use std::time::Duration;
use tracing::debug;

/// Production transport over a pooled `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        // Minimal production-friendly defaults (env-overridable).
        let timeout = timeout.unwrap_or_else(|| {
            Duration::from_secs(
                env::var("REQUEUE_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(30),
            )
        });

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("REQUEUE_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("REQUEUE_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("REQUEUE_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(
        &self,
        call: TransportCall,
        on_chunk: Option<ProgressFn>,
    ) -> Result<RawReply, TransportError> {
        let mut req = self.client.request(call.method.clone(), &call.url);
        for (name, value) in &call.headers {
            req = req.header(name, value);
        }
        if let Some(body) = &call.body {
            req = req.body(body.clone());
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_builder() => {
                // The call never made it to the wire (e.g. an unparseable URL).
                debug!(url = call.url.as_str(), error = %e, "request could not be built");
                return Err(TransportError::Http(e));
            }
            Err(e) => {
                debug!(url = call.url.as_str(), error = %e, "connection-level failure");
                return Ok(RawReply::connection_failed());
            }
        };

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let total = resp.content_length();

        let mut body = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    body.extend_from_slice(&chunk);
                    if let Some(observer) = &on_chunk {
                        observer(Progress {
                            bytes: body.len() as u64,
                            total,
                        });
                    }
                }
                Err(e) => {
                    debug!(url = call.url.as_str(), error = %e, "body read failed mid-stream");
                    return Ok(RawReply::connection_failed());
                }
            }
        }

        Ok(RawReply {
            status,
            content_type,
            body: body.into(),
            opened: true,
        })
    }
}
