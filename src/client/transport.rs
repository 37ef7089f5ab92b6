//! JSON-RPC-over-HTTP transport — sends envelopes to `POST {base}/a2a`,
//! allocates monotonically increasing request ids, and injects W3C
//! trace-context headers when one is in scope.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::error::{A2AError, A2AResult};
use crate::types::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};

use super::sse::SseStream;
use super::trace;

/// Transport abstraction for the client's outbound JSON-RPC traffic.
/// Implementations own request-id allocation so a single transport
/// instance hands out a strictly increasing sequence regardless of how
/// many concurrent callers share it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, method: &str, params: serde_json::Value) -> A2AResult<JsonRpcResponse>;

    /// Send a streaming request. `cancel` is derived from the caller's
    /// cancellation signal; firing it tears down the SSE parse task and
    /// releases the response body.
    async fn send_stream(
        &self,
        method: &str,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> A2AResult<SseStream>;

    async fn close(&self) -> A2AResult<()> {
        Ok(())
    }
}

/// Bearer/custom auth scheme carried as `Authorization: <scheme> <token>`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub scheme: String,
    pub token: String,
}

impl AuthConfig {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            scheme: "Bearer".to_string(),
            token: token.into(),
        }
    }

    fn header_value(&self) -> String {
        format!("{} {}", self.scheme, self.token)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub timeout: Option<Duration>,
    pub headers: HashMap<String, String>,
    pub auth: Option<AuthConfig>,
}

/// JSON-RPC over HTTP transport using `reqwest`, targeting a fixed `POST
/// {base}/a2a` endpoint.
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: String,
    auth: Option<AuthConfig>,
    next_id: AtomicI64,
    // Retained so `with_*` builder calls can be chained without each one
    // discarding the state the previous call set — `reqwest::Client` has no
    // getter for its own default headers/timeout once built.
    config: TransportConfig,
}

impl std::fmt::Debug for JsonRpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcTransport")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(url, TransportConfig::default())
    }

    pub fn with_config(url: impl Into<String>, config: TransportConfig) -> Self {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            }
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: url.into(),
            auth: config.auth.clone(),
            next_id: AtomicI64::new(1),
            config,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let url = self.url.clone();
        let mut config = self.config.clone();
        config.timeout = Some(timeout);
        Self::with_config(url, config)
    }

    pub fn with_header(self, key: &str, value: &str) -> Self {
        let url = self.url.clone();
        let mut config = self.config.clone();
        config.headers.insert(key.to_string(), value.to_string());
        Self::with_config(url, config)
    }

    pub fn with_auth(self, auth: AuthConfig) -> Self {
        let url = self.url.clone();
        let mut config = self.config.clone();
        config.auth = Some(auth);
        Self::with_config(url, config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn allocate_id(&self) -> JsonRpcId {
        JsonRpcId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn apply_common_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder.header("Content-Type", "application/json");
        if let Some(auth) = &self.auth {
            builder = builder.header("Authorization", auth.header_value());
        }
        if let Some(ctx) = trace::current() {
            builder = builder.header("traceparent", ctx.traceparent());
            if let Some(tracestate) = &ctx.tracestate {
                builder = builder.header("tracestate", tracestate.clone());
            }
        }
        builder
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn send(&self, method: &str, params: serde_json::Value) -> A2AResult<JsonRpcResponse> {
        let request = JsonRpcRequest::new(self.allocate_id(), method, params);
        let body = serde_json::to_vec(&request)
            .map_err(|e| A2AError::Transport(format!("failed to serialize request: {e}")))?;

        let response = self
            .apply_common_headers(self.client.post(&self.url))
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("invalid JSON-RPC response: {e}")))
    }

    async fn send_stream(
        &self,
        method: &str,
        params: serde_json::Value,
        cancel: CancellationToken,
    ) -> A2AResult<SseStream> {
        let request = JsonRpcRequest::new(self.allocate_id(), method, params);
        let body = serde_json::to_vec(&request)
            .map_err(|e| A2AError::Transport(format!("failed to serialize request: {e}")))?;

        let response = self
            .apply_common_headers(self.client.post(&self.url))
            .header("Accept", "text/event-stream")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(SseStream::from_response(response, cancel))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> A2AError {
    if e.is_timeout() {
        A2AError::Timeout(format!("request timed out: {e}"))
    } else if e.is_connect() {
        A2AError::Transport(format!("connection failed: {e}"))
    } else {
        A2AError::Transport(format!("HTTP request failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_monotonically() {
        let transport = JsonRpcTransport::new("http://localhost/a2a");
        let first = transport.allocate_id();
        let second = transport.allocate_id();
        assert_eq!(first, JsonRpcId::Number(1));
        assert_eq!(second, JsonRpcId::Number(2));
    }

    #[test]
    fn auth_header_value_format() {
        let auth = AuthConfig::bearer("secret-token");
        assert_eq!(auth.header_value(), "Bearer secret-token");
    }

    #[test]
    fn chained_with_calls_preserve_earlier_settings() {
        let transport = JsonRpcTransport::new("http://localhost/a2a")
            .with_header("x-one", "1")
            .with_header("x-two", "2")
            .with_timeout(Duration::from_secs(5))
            .with_auth(AuthConfig::bearer("tok"));

        assert_eq!(transport.config.headers.get("x-one").map(String::as_str), Some("1"));
        assert_eq!(transport.config.headers.get("x-two").map(String::as_str), Some("2"));
        assert_eq!(transport.config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(transport.auth.as_ref().unwrap().token, "tok");
    }
}
