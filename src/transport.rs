//! HTTP transport abstraction.
//!
//! `Transport` is the one seam between the executor and the network.
//! `ReqwestTransport` makes real calls; `StubTransport` (tests only) replays
//! scripted responses and counts calls.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::abort::CANCEL_REASON;
use crate::error::{FetchError, Result};
use crate::request::Method;

/// A fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// A fully buffered response.
///
/// The body is held as [`Bytes`], so clones share the buffer and every clone
/// can be read independently. Cached snapshots rely on this.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: body.into(),
            url: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as UTF-8 text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON. An empty body parses as `null`.
    pub fn json_value(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Parse the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Sends one request. Implementations may watch `signal` to stop early; the
/// executor abandons the call as soon as the signal fires either way.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        signal: &CancellationToken,
    ) -> Result<HttpResponse>;
}

/// Production transport over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("replayfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Wrap an existing client (custom TLS, proxies, pools).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn execute(&self, request: TransportRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method.into(), &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        signal: &CancellationToken,
    ) -> Result<HttpResponse> {
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(FetchError::Aborted {
                reason: CANCEL_REASON.to_string(),
            }),
            result = self.execute(request) => result,
        }
    }
}

/// Scripted transport for tests.
///
/// Returns the configured response (or error) after an optional latency and
/// records every request it receives.
#[cfg(test)]
pub struct StubTransport {
    pub status: u16,
    pub body: String,
    pub latency: Option<std::time::Duration>,
    pub error: Option<String>,
    pub calls: std::sync::atomic::AtomicUsize,
    pub requests: std::sync::Mutex<Vec<TransportRequest>>,
}

#[cfg(test)]
impl StubTransport {
    pub fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            latency: None,
            error: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        let mut stub = Self::status(200, "");
        stub.error = Some(message.to_string());
        stub
    }

    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl Transport for StubTransport {
    async fn send(
        &self,
        request: TransportRequest,
        _signal: &CancellationToken,
    ) -> Result<HttpResponse> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(ref msg) = self.error {
            return Err(FetchError::Transport(msg.clone()));
        }
        let mut response = HttpResponse::new(self.status, self.body.clone());
        response.url = url;
        Ok(response)
    }
}
