//! The request state machine.
//!
//! One call to [`RequestExecutor::dispatch`] makes exactly one pass through:
//!
//! ```text
//! INIT -> CACHE_CHECK -> HIT ------------------------------> DONE
//!                     \-> MISS -> DISPATCH -> SUCCESS|FAILURE -> DONE
//! ```
//!
//! No error escapes: every failure comes back as [`Outcome::Failure`] with a
//! readable message, the underlying [`FetchError`] and the key, if any.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::abort::{AbortScheduler, CANCEL_REASON};
use crate::cache::{CacheEntry, CacheStats, ResponseCache, DEFAULT_CACHE_TTL};
use crate::error::{FailureKind, FetchError, Result};
use crate::registry::RequestRegistry;
use crate::request::{RequestDefaults, RequestOptions, RequestPayload, StoredRequest};
use crate::transport::{HttpResponse, Transport, TransportRequest};
use crate::utils::{
    default_headers, default_minter, join_path, serialize_query, KeyMinter, RequestKey,
};

/// States of a single dispatch, used in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    CacheCheck,
    Hit,
    Miss,
    Dispatch,
    Success,
    Failure,
}

/// A completed call.
#[derive(Debug, Clone)]
pub struct Success {
    /// Parsed JSON body (`null` for an empty body).
    pub data: Value,
    /// The raw response the data was parsed from.
    pub response: HttpResponse,
    pub key: Option<RequestKey>,
}

impl Success {
    /// Project the data.
    ///
    /// `None` returns the full data. `Some(fields)` returns an object holding
    /// only those fields that exist; an empty list yields `{}`.
    pub fn pick(&self, fields: Option<&[&str]>) -> Value {
        let Some(fields) = fields else {
            return self.data.clone();
        };
        let mut picked = Map::new();
        if let Value::Object(ref obj) = self.data {
            for field in fields {
                if let Some(value) = obj.get(*field) {
                    picked.insert((*field).to_string(), value.clone());
                }
            }
        }
        Value::Object(picked)
    }

    /// Deserialize the data into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// A failed call.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Failure {
    #[source]
    pub error: FetchError,
    pub message: String,
    pub key: Option<RequestKey>,
}

impl Failure {
    fn new(error: FetchError, key: Option<RequestKey>) -> Self {
        Self {
            message: error.user_message(),
            error,
            key,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Result of one pass through the state machine.
#[derive(Debug)]
pub enum Outcome {
    Success(Success),
    Failure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Success(s) => s.key.as_deref(),
            Self::Failure(f) => f.key.as_deref(),
        }
    }

    pub fn into_result(self) -> std::result::Result<Success, Failure> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Failure(f) => Err(f),
        }
    }
}

/// Orchestrates cache, registry, abort scheduling and the transport.
///
/// Registry and cache sit behind mutexes that are never held across an
/// await point.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    registry: Mutex<RequestRegistry>,
    cache: Mutex<ResponseCache>,
    minter: Arc<dyn KeyMinter>,
    defaults: RequestDefaults,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, defaults: RequestDefaults) -> Self {
        let minter = default_minter();
        Self {
            transport,
            registry: Mutex::new(RequestRegistry::new(Arc::clone(&minter))),
            cache: Mutex::new(ResponseCache::new(DEFAULT_CACHE_TTL)),
            minter,
            defaults,
        }
    }

    /// Replace the key minter used for cache/registry keys.
    pub fn with_minter(mut self, minter: Arc<dyn KeyMinter>) -> Self {
        self.registry = Mutex::new(RequestRegistry::new(Arc::clone(&minter)));
        self.minter = minter;
        self
    }

    /// Replace the cache freshness window.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Mutex::new(ResponseCache::new(ttl));
        self
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Run one request through the state machine.
    pub async fn dispatch(&self, payload: RequestPayload) -> Outcome {
        debug!(stage = ?Stage::Init, "Dispatching request");
        let payload = payload.normalized(&self.defaults);
        let supplied_key = payload.key.clone();

        if let Some(ref key) = supplied_key {
            debug!(stage = ?Stage::CacheCheck, key = %key);
            let cached = self.cache.lock().get(key);
            if let Some(entry) = cached {
                debug!(stage = ?Stage::Hit, key = %key, "Serving cached response");
                return Self::finish(entry.response, Some(key.clone()));
            }
        }
        debug!(stage = ?Stage::Miss);

        let cache = payload.cache.unwrap_or(self.defaults.cache);
        let remember = payload.remember.unwrap_or(self.defaults.remember);

        // Only mint when something will be stored under the key.
        let key = match supplied_key {
            Some(k) => Some(k),
            None if cache || remember => Some(self.minter.mint()),
            None => None,
        };

        if remember {
            self.registry.lock().store(payload.clone(), key.clone());
        }

        let url = self.endpoint(&payload);
        let method = payload.effective_method();
        let timeout = payload.timeout.unwrap_or(self.defaults.timeout);

        let scheduler = match payload.options.signal {
            Some(ref parent) => AbortScheduler::linked(parent, timeout, true),
            None => AbortScheduler::create(timeout, true),
        };
        let _timer = scheduler.guard();
        let signal = scheduler.signal();

        let request = TransportRequest {
            method,
            url: url.clone(),
            headers: self.headers(&payload.options),
            body: payload.effective_body(),
        };

        debug!(stage = ?Stage::Dispatch, method = %method, url = %url, key = ?key);
        let result = tokio::select! {
            biased;
            _ = signal.cancelled() => Err(FetchError::Aborted {
                reason: scheduler.reason().unwrap_or_else(|| CANCEL_REASON.to_string()),
            }),
            result = self.transport.send(request, &signal) => result,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => return Self::fail(e, key, &url),
        };

        if !response.is_success() {
            let status = response.status.as_u16();
            return Self::fail(FetchError::from_status(status), key, &url);
        }

        if cache {
            if let Some(ref k) = key {
                self.cache.lock().put(k.clone(), &response);
            }
        }

        Self::finish(response, key)
    }

    /// Lowest-level entry point; same as [`dispatch`](Self::dispatch).
    pub async fn raw_request(&self, payload: RequestPayload) -> Outcome {
        self.dispatch(payload).await
    }

    /// Dispatch and split the outcome into `Ok(Success)` / `Err(Failure)`,
    /// so callers can use `?` and [`Success::pick`].
    pub async fn request(&self, payload: RequestPayload) -> std::result::Result<Success, Failure> {
        self.dispatch(payload).await.into_result()
    }

    fn endpoint(&self, payload: &RequestPayload) -> String {
        let base = payload
            .base_url
            .as_deref()
            .unwrap_or(&self.defaults.base_url);
        let path = payload.path.as_deref().unwrap_or("");
        let query = payload
            .params
            .as_deref()
            .map(serialize_query)
            .unwrap_or_default();
        format!("{}{}", join_path(base, path), query)
    }

    fn headers(&self, options: &RequestOptions) -> reqwest::header::HeaderMap {
        let mut headers = default_headers(options);
        for (name, value) in self.defaults.headers.iter().chain(options.headers.iter()) {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    fn finish(response: HttpResponse, key: Option<RequestKey>) -> Outcome {
        match response.json_value() {
            Ok(data) => {
                debug!(stage = ?Stage::Success, key = ?key);
                Outcome::Success(Success {
                    data,
                    response,
                    key,
                })
            }
            Err(e) => Self::fail(e, key, &response.url),
        }
    }

    fn fail(error: FetchError, key: Option<RequestKey>, url: &str) -> Outcome {
        warn!(stage = ?Stage::Failure, key = ?key, url = %url, error = %error, "Request failed");
        Outcome::Failure(Failure::new(error, key))
    }

    // -- registry / cache administration -----------------------------------

    /// Remember `payload` for replay. Mints a key when `key` is `None`.
    pub fn store_request(&self, payload: RequestPayload, key: Option<RequestKey>) -> RequestKey {
        self.registry.lock().store(payload, key)
    }

    pub fn get_request(&self, key: &str) -> Option<StoredRequest> {
        self.registry.lock().get(key).cloned()
    }

    pub fn delete_request(&self, key: &str) -> bool {
        self.registry.lock().delete(key)
    }

    pub fn cache_response(&self, key: impl Into<RequestKey>, response: &HttpResponse) {
        self.cache.lock().put(key.into(), response);
    }

    /// Fresh cache entry for `key`; a stale one is evicted and `None` returned.
    pub fn get_cached_response(&self, key: &str) -> Option<CacheEntry> {
        self.cache.lock().get(key)
    }

    pub fn clear_cached_response(&self, key: &str) -> bool {
        self.cache.lock().evict(key)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use crate::transport::{MockTransport, StubTransport};
    use serde_json::json;

    fn executor(stub: &Arc<StubTransport>) -> RequestExecutor {
        RequestExecutor::new(stub.clone(), RequestDefaults::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_concrete_scenario_cache_hit() {
        let stub = Arc::new(StubTransport::ok(r#"{"id":1}"#));
        let exec = executor(&stub);

        let first = exec
            .raw_request(RequestPayload::new().path("products").key("k1"))
            .await;
        let Outcome::Success(first) = first else {
            panic!("expected success");
        };
        assert_eq!(first.data, json!({"id": 1}));
        assert_eq!(first.key.as_deref(), Some("k1"));
        assert_eq!(
            stub.last_request().unwrap().url,
            "https://dummyjson.com/products"
        );

        let second = exec.raw_request(RequestPayload::new().key("k1")).await;
        let Outcome::Success(second) = second else {
            panic!("expected cached success");
        };
        assert_eq!(second.data, first.data);
        assert_eq!(second.key.as_deref(), Some("k1"));
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_reissues_call() {
        let stub = Arc::new(StubTransport::ok(r#"{"id":1}"#));
        let exec = executor(&stub);

        assert!(exec.raw_request(RequestPayload::new().key("k")).await.is_success());
        tokio::time::advance(DEFAULT_CACHE_TTL).await;
        assert!(exec.raw_request(RequestPayload::new().key("k")).await.is_success());
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_disabled_never_stores() {
        let stub = Arc::new(StubTransport::ok("{}"));
        let exec = executor(&stub);
        let payload = RequestPayload::new().key("k").cache(false);
        exec.raw_request(payload.clone()).await;
        exec.raw_request(payload).await;
        assert_eq!(stub.call_count(), 2);
        assert!(exec.get_cached_response("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_minted_only_when_needed() {
        let stub = Arc::new(StubTransport::ok("{}"));
        let exec = executor(&stub);

        let cached = exec.raw_request(RequestPayload::new()).await;
        assert!(cached.key().is_some());

        let fire_and_forget = exec.raw_request(RequestPayload::new().cache(false)).await;
        assert!(fire_and_forget.key().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_executors_mint_distinct_keys() {
        let stub = Arc::new(StubTransport::ok("{}"));
        let a = executor(&stub);
        let b = executor(&stub);

        let ka = a.raw_request(RequestPayload::new()).await.key().map(str::to_string);
        let kb = b.raw_request(RequestPayload::new()).await.key().map(str::to_string);
        let kp = crate::utils::mint_key();

        let (ka, kb) = (ka.unwrap(), kb.unwrap());
        assert_ne!(ka, kb);
        assert_ne!(ka, kp);
        assert_ne!(kb, kp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remember_stores_normalized_payload() {
        let stub = Arc::new(StubTransport::ok("{}"));
        let exec = executor(&stub);
        let outcome = exec
            .raw_request(RequestPayload::new().path("carts").remember(true).cache(false))
            .await;
        let key = outcome.key().unwrap().to_string();
        let stored = exec.get_request(&key).unwrap();
        assert_eq!(stored.payload().path.as_deref(), Some("carts"));
        assert_eq!(
            stored.payload().base_url.as_deref(),
            Some("https://dummyjson.com")
        );
        assert!(stored.payload().remember.is_none());
        assert!(exec.get_cached_response(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_404_is_not_found() {
        let stub = Arc::new(StubTransport::status(404, "{}"));
        let exec = executor(&stub);
        let failure = exec
            .request(RequestPayload::new().key("k"))
            .await
            .unwrap_err();
        assert_eq!(failure.message, "Page not found");
        assert_eq!(failure.kind(), FailureKind::NotFound);
        assert_eq!(failure.key.as_deref(), Some("k"));
        assert!(exec.get_cached_response("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_500_is_generic_network_error() {
        let stub = Arc::new(StubTransport::status(500, "oops"));
        let exec = executor(&stub);
        let failure = exec.request(RequestPayload::new()).await.unwrap_err();
        assert_eq!(failure.message, "Network response was not OK");
        assert_ne!(failure.message, "Page not found");
        assert_eq!(failure.kind(), FailureKind::NetworkError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shorter_than_latency_aborts() {
        let stub = Arc::new(StubTransport::ok("{}").with_latency(Duration::from_secs(5)));
        let exec = executor(&stub);
        let failure = exec
            .request(RequestPayload::new().timeout(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert_eq!(failure.message, "Request timeout passed so aborted");
        assert_eq!(failure.kind(), FailureKind::AbortError);
        assert!(matches!(
            failure.error,
            FetchError::Aborted { ref reason } if reason == "Request timeout exceeded"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_longer_than_latency_succeeds() {
        let stub = Arc::new(StubTransport::ok(r#"{"ok":true}"#).with_latency(Duration::from_millis(50)));
        let exec = executor(&stub);
        let success = exec
            .request(RequestPayload::new().timeout(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(success.data, json!({"ok": true}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_signal_cancels_call() {
        let stub = Arc::new(StubTransport::ok("{}").with_latency(Duration::from_secs(5)));
        let exec = executor(&stub);
        let signal = tokio_util::sync::CancellationToken::new();
        signal.cancel();
        let failure = exec
            .request(RequestPayload::new().signal(signal))
            .await
            .unwrap_err();
        assert_eq!(failure.kind(), FailureKind::AbortError);
        assert!(matches!(
            failure.error,
            FetchError::Aborted { ref reason } if reason == CANCEL_REASON
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_scheduler_timeout_reason_propagates() {
        let stub = Arc::new(StubTransport::ok("{}").with_latency(Duration::from_secs(5)));
        let exec = executor(&stub);
        let caller = AbortScheduler::create(Duration::from_millis(100), true);
        let failure = exec
            .request(
                RequestPayload::new()
                    .timeout(Duration::from_secs(10))
                    .signal(caller.abort_signal()),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            FetchError::Aborted { ref reason } if reason == crate::abort::TIMEOUT_REASON
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_message_surfaces() {
        let stub = Arc::new(StubTransport::failing("connection refused"));
        let exec = executor(&stub);
        let failure = exec.request(RequestPayload::new()).await.unwrap_err();
        assert_eq!(failure.message, "connection refused");
        assert_eq!(failure.kind(), FailureKind::UnknownError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_json_body_is_failure() {
        let stub = Arc::new(StubTransport::ok("not json"));
        let exec = executor(&stub);
        let failure = exec.request(RequestPayload::new()).await.unwrap_err();
        assert!(matches!(failure.error, FetchError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_shape() {
        let stub = Arc::new(StubTransport::ok("{}"));
        let exec = executor(&stub);
        let payload = RequestPayload::new()
            .base_url("https://api.example.com/")
            .path("/products/search")
            .param("q", "phone")
            .param("limit", 5)
            .method(Method::Post)
            .body(r#"{"a":1}"#)
            .header("content-type", "text/plain")
            .unwrap()
            .header("x-trace", "abc")
            .unwrap();
        exec.request(payload).await.unwrap();

        let sent = stub.last_request().unwrap();
        assert_eq!(
            sent.url,
            "https://api.example.com/products/search?q=phone&limit=5"
        );
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(sent.headers.get("x-trace").unwrap(), "abc");
        assert_eq!(sent.body.unwrap(), bytes::Bytes::from(r#"{"a":1}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_content_type_applied() {
        let stub = Arc::new(StubTransport::ok("{}"));
        let exec = executor(&stub);
        exec.request(RequestPayload::new()).await.unwrap();
        let sent = stub.last_request().unwrap();
        assert_eq!(sent.headers.get("content-type").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_mock_transport_classifies_404() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(404, "")));
        let exec = RequestExecutor::new(Arc::new(mock), RequestDefaults::default());
        let failure = exec.request(RequestPayload::new()).await.unwrap_err();
        assert_eq!(failure.message, "Page not found");
    }

    #[test]
    fn test_pick_projection() {
        let success = Success {
            data: json!({"id": 1, "title": "x", "price": 3}),
            response: HttpResponse::new(200, ""),
            key: None,
        };
        assert_eq!(success.pick(None), success.data);
        assert_eq!(
            success.pick(Some(&["id", "price", "missing"])),
            json!({"id": 1, "price": 3})
        );
        assert_eq!(success.pick(Some(&[])), json!({}));
    }

    #[test]
    fn test_success_typed_json() {
        #[derive(serde::Deserialize)]
        struct Product {
            id: u32,
        }
        let success = Success {
            data: json!({"id": 7}),
            response: HttpResponse::new(200, ""),
            key: None,
        };
        assert_eq!(success.json::<Product>().unwrap().id, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_cache_ops() {
        let stub = Arc::new(StubTransport::ok(r#"{"n":2}"#));
        let exec = executor(&stub);
        exec.cache_response("manual", &HttpResponse::new(200, r#"{"n":1}"#));

        let hit = exec
            .request(RequestPayload::new().key("manual"))
            .await
            .unwrap();
        assert_eq!(hit.data, json!({"n": 1}));
        assert_eq!(stub.call_count(), 0);

        assert!(exec.clear_cached_response("manual"));
        let miss = exec
            .request(RequestPayload::new().key("manual"))
            .await
            .unwrap();
        assert_eq!(miss.data, json!({"n": 2}));

        exec.clear_cache();
        assert_eq!(exec.cache_stats().total_entries, 0);
    }
}
