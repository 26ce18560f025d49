//! Configuration loading.
//!
//! Reads `~/.replayfetch/config.json` (all fields optional), then applies
//! environment overrides:
//!
//! | Variable                  | Field        |
//! |---------------------------|--------------|
//! | `REPLAYFETCH_BASE_URL`    | `base_url`   |
//! | `REPLAYFETCH_TIMEOUT_MS`  | `timeout_ms` |
//!
//! The cache TTL is fixed and cannot be configured.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FetchError, Result};
use crate::request::{RequestDefaults, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

const ENV_BASE_URL: &str = "REPLAYFETCH_BASE_URL";
const ENV_TIMEOUT_MS: &str = "REPLAYFETCH_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root every request path is joined onto.
    pub base_url: String,
    /// Milliseconds before a call is auto-cancelled.
    pub timeout_ms: u64,
    /// Cache successful responses unless a request opts out.
    pub cache: bool,
    /// Remember requests for replay unless a request opts out.
    pub remember: bool,
    /// Entity name -> endpoint overrides for the entity routers.
    pub endpoints: HashMap<String, String>,
    /// Extra headers sent with every request (caller headers still win).
    pub headers: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            cache: true,
            remember: false,
            endpoints: HashMap::new(),
            headers: HashMap::new(),
        }
    }
}

impl Config {
    /// `~/.replayfetch`
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".replayfetch")
    }

    /// `~/.replayfetch/config.json`
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path, apply env overrides and validate.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                FetchError::Config(format!("Invalid config file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(FetchError::Io(e)),
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = base_url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring non-numeric {}", ENV_TIMEOUT_MS),
            }
        }
    }

    /// Reject values no request could be built from.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            FetchError::Config(format!("base_url '{}' is not a valid URL: {}", self.base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::Config(format!(
                "base_url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.timeout_ms == 0 {
            return Err(FetchError::Config("timeout_ms must be greater than 0".into()));
        }
        for (entity, endpoint) in &self.endpoints {
            if entity.trim().is_empty() || endpoint.trim().is_empty() {
                return Err(FetchError::Config(
                    "endpoints entries must have a non-empty name and endpoint".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The executor defaults this config describes.
    pub fn request_defaults(&self) -> Result<RequestDefaults> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                FetchError::Config(format!("Invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                FetchError::Config(format!(
                    "Invalid value for header '{}': {}",
                    name.as_str(),
                    e
                ))
            })?;
            headers.insert(name, value);
        }
        Ok(RequestDefaults {
            base_url: self.base_url.clone(),
            timeout: self.timeout(),
            cache: self.cache,
            remember: self.remember,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.base_url, "https://dummyjson.com");
        assert_eq!(cfg.timeout_ms, 3000);
        assert!(cfg.cache);
        assert!(!cfg.remember);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::load_from_path(&tmp.path().join("absent.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"base_url":"https://api.example.com","endpoints":{"category":"products/categories"}}"#,
        )
        .unwrap();
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.base_url, "https://api.example.com");
        assert_eq!(cfg.timeout_ms, 3000);
        assert_eq!(
            cfg.endpoints.get("category").map(String::as_str),
            Some("products/categories")
        );
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(|name| match name {
            ENV_BASE_URL => Some(" https://staging.example.com ".into()),
            ENV_TIMEOUT_MS => Some("750".into()),
            _ => None,
        });
        assert_eq!(cfg.base_url, "https://staging.example.com");
        assert_eq!(cfg.timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_bad_timeout_override_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(|name| (name == ENV_TIMEOUT_MS).then(|| "soon".to_string()));
        assert_eq!(cfg.timeout_ms, 3000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = Config {
            base_url: "not a url".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            base_url: "ftp://files.example.com".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            timeout_ms: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_request_defaults_parses_headers() {
        let mut cfg = Config::default();
        cfg.headers.insert("x-api-version".into(), "2".into());
        let defaults = cfg.request_defaults().unwrap();
        assert_eq!(defaults.headers.get("x-api-version").unwrap(), "2");
        assert_eq!(defaults.timeout, Duration::from_millis(3000));

        cfg.headers.insert("bad header".into(), "x".into());
        assert!(cfg.request_defaults().is_err());
    }
}
