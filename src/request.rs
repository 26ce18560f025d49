//! Request descriptors: what callers hand to the executor, and what the
//! registry keeps for replay.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::abort::AbortSignal;
use crate::error::{FetchError, Result};
use crate::utils::RequestKey;

/// Default base location when neither config nor payload names one.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";
/// Default per-call timeout before auto-cancel.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Supported HTTP verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(FetchError::Config(format!(
                "Unsupported HTTP method '{}'",
                other
            ))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Transport-level options. `method` and `body`, when set, take precedence
/// over the payload's own `method` and `data`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub method: Option<Method>,
    pub body: Option<Bytes>,
    /// External cancellation signal. Never persisted.
    pub signal: Option<AbortSignal>,
}

impl RequestOptions {
    /// Merge `other` over `self`; `other` wins per header and per field.
    pub fn merged_with(&self, other: &RequestOptions) -> RequestOptions {
        let mut headers = self.headers.clone();
        for (name, value) in other.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        RequestOptions {
            headers,
            method: other.method.or(self.method),
            body: other.body.clone().or_else(|| self.body.clone()),
            signal: other.signal.clone().or_else(|| self.signal.clone()),
        }
    }
}

/// Everything a caller can say about one request. Unset fields fall back to
/// the executor's defaults at dispatch time.
#[derive(Debug, Clone, Default)]
pub struct RequestPayload {
    pub base_url: Option<String>,
    pub path: Option<String>,
    pub timeout: Option<Duration>,
    pub params: Option<Vec<(String, String)>>,
    pub key: Option<RequestKey>,
    pub options: RequestOptions,
    pub method: Option<Method>,
    pub cache: Option<bool>,
    pub remember: Option<bool>,
    pub data: Option<Bytes>,
}

impl RequestPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append one query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.to_string()));
        self
    }

    pub fn key(mut self, key: impl Into<RequestKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    pub fn remember(mut self, enabled: bool) -> Self {
        self.remember = Some(enabled);
        self
    }

    /// Set a raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.data = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.data = Some(Bytes::from(serde_json::to_vec(value)?));
        Ok(self)
    }

    /// Add a caller header. Fails on an invalid header name or value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| FetchError::Config(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Config(format!("Invalid header value: {}", e)))?;
        self.options.headers.insert(name, value);
        Ok(self)
    }

    /// Cancel the call when `signal` fires. Accepts a bare
    /// `CancellationToken` or a scheduler's [`AbortSignal`].
    pub fn signal(mut self, signal: impl Into<AbortSignal>) -> Self {
        self.options.signal = Some(signal.into());
        self
    }

    /// Fill every unset field from `defaults`.
    pub fn normalized(mut self, defaults: &RequestDefaults) -> Self {
        self.base_url.get_or_insert_with(|| defaults.base_url.clone());
        self.timeout.get_or_insert(defaults.timeout);
        self.path.get_or_insert_with(String::new);
        self.method.get_or_insert(Method::Get);
        self.cache.get_or_insert(defaults.cache);
        self.remember.get_or_insert(defaults.remember);
        self
    }

    /// Field-wise merge where `overrides` wins on every field it sets.
    pub fn merged_with(&self, overrides: &RequestPayload) -> RequestPayload {
        RequestPayload {
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            path: overrides.path.clone().or_else(|| self.path.clone()),
            timeout: overrides.timeout.or(self.timeout),
            params: overrides.params.clone().or_else(|| self.params.clone()),
            key: overrides.key.clone().or_else(|| self.key.clone()),
            options: self.options.merged_with(&overrides.options),
            method: overrides.method.or(self.method),
            cache: overrides.cache.or(self.cache),
            remember: overrides.remember.or(self.remember),
            data: overrides.data.clone().or_else(|| self.data.clone()),
        }
    }

    /// Method actually sent: the options' method wins over the payload's.
    pub fn effective_method(&self) -> Method {
        self.options.method.or(self.method).unwrap_or_default()
    }

    /// Body actually sent: the options' body wins over `data`.
    pub fn effective_body(&self) -> Option<Bytes> {
        self.options.body.clone().or_else(|| self.data.clone())
    }
}

/// Values an executor fills into unset payload fields.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub base_url: String,
    pub timeout: Duration,
    pub cache: bool,
    pub remember: bool,
    /// Extra headers layered between the built-in defaults and caller headers.
    pub headers: HeaderMap,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache: true,
            remember: false,
            headers: HeaderMap::new(),
        }
    }
}

/// A replayable request with its volatile fields stripped.
///
/// Holds no cancellation signal and no `remember` flag, so replaying it can
/// never re-store it. Immutable once built.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    payload: RequestPayload,
}

impl StoredRequest {
    pub fn new(mut payload: RequestPayload) -> Self {
        payload.options.signal = None;
        payload.remember = None;
        Self { payload }
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// A fresh payload to re-issue this request with.
    pub fn to_payload(&self) -> RequestPayload {
        self.payload.clone()
    }
}
