//! High-level client facade.
//!
//! [`Fetcher`] bundles one executor (cache + registry + transport) with the
//! verb helpers and the four entity routers. [`Fetcher::global`] gives a
//! lazily built process-wide instance configured from
//! `~/.replayfetch/config.json`.
//!
//! # Example
//!
//! ```rust,no_run
//! # tokio_test::block_on(async {
//! use replayfetch::{Fetcher, RequestPayload};
//!
//! let fetcher = Fetcher::builder().build().unwrap();
//!
//! // GET https://dummyjson.com/categories, cached under a fresh key
//! let products = fetcher.get().dispatch("category", RequestPayload::new()).await;
//!
//! // Same key within the hour: served from cache
//! let first = fetcher.request(RequestPayload::new().path("products/1").key("p1")).await;
//! let again = fetcher.request(RequestPayload::new().key("p1")).await;
//! # });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::cache::CacheEntry;
use crate::config::Config;
use crate::error::Result;
use crate::executor::{Failure, Outcome, RequestExecutor, Success};
use crate::handle::CancellableRequest;
use crate::replay::{self, DeletePolicy};
use crate::request::{Method, RequestPayload, StoredRequest};
use crate::router::{EndpointTable, EntityRouter, HttpVerbs};
use crate::transport::{HttpResponse, ReqwestTransport, Transport};
use crate::utils::{KeyMinter, RequestKey};

static GLOBAL: OnceCell<Fetcher> = OnceCell::new();

/// Entry point for keyed, cached, cancellable requests.
pub struct Fetcher {
    executor: Arc<RequestExecutor>,
    http: HttpVerbs,
    get: EntityRouter,
    post: EntityRouter,
    put: EntityRouter,
    drop: EntityRouter,
}

impl Fetcher {
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// Process-wide instance, built on first use from [`Config::load`] with
    /// the reqwest transport. Never torn down.
    pub fn global() -> Result<&'static Fetcher> {
        GLOBAL.get_or_try_init(|| Fetcher::builder().config(Config::load()?).build())
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Run the state machine and return its raw outcome.
    pub async fn raw_request(&self, payload: RequestPayload) -> Outcome {
        self.executor.raw_request(payload).await
    }

    /// Run the state machine; `Ok` carries [`Success::pick`].
    pub async fn request(&self, payload: RequestPayload) -> std::result::Result<Success, Failure> {
        self.executor.request(payload).await
    }

    /// A reusable handle over `payload` that can be cancelled.
    pub fn create_request(&self, payload: RequestPayload) -> CancellableRequest {
        CancellableRequest::new(Arc::clone(&self.executor), payload)
    }

    pub fn http(&self) -> &HttpVerbs {
        &self.http
    }

    pub fn get(&self) -> &EntityRouter {
        &self.get
    }

    pub fn post(&self) -> &EntityRouter {
        &self.post
    }

    pub fn put(&self) -> &EntityRouter {
        &self.put
    }

    pub fn drop(&self) -> &EntityRouter {
        &self.drop
    }

    /// Router for an arbitrary verb.
    pub fn router(&self, method: Method) -> &EntityRouter {
        match method {
            Method::Get => &self.get,
            Method::Post => &self.post,
            Method::Put => &self.put,
            Method::Delete => &self.drop,
        }
    }

    /// Replay the request stored under `key`. `None` if nothing is stored.
    pub async fn resolve(
        &self,
        key: &str,
        policy: DeletePolicy,
    ) -> Option<std::result::Result<Success, Failure>> {
        replay::resolve(&self.executor, key, policy).await
    }

    pub fn store_request(&self, payload: RequestPayload, key: Option<RequestKey>) -> RequestKey {
        self.executor.store_request(payload, key)
    }

    pub fn get_request(&self, key: &str) -> Option<StoredRequest> {
        self.executor.get_request(key)
    }

    pub fn delete_request(&self, key: &str) -> bool {
        self.executor.delete_request(key)
    }

    pub fn cache_response(&self, key: impl Into<RequestKey>, response: &HttpResponse) {
        self.executor.cache_response(key, response)
    }

    pub fn get_cached_response(&self, key: &str) -> Option<CacheEntry> {
        self.executor.get_cached_response(key)
    }

    pub fn clear_cached_response(&self, key: &str) -> bool {
        self.executor.clear_cached_response(key)
    }

    pub fn clear_cache(&self) {
        self.executor.clear_cache()
    }
}

/// Builder for [`Fetcher`].
pub struct FetcherBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    minter: Option<Arc<dyn KeyMinter>>,
    endpoints: HashMap<String, String>,
}

impl FetcherBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            transport: None,
            minter: None,
            endpoints: HashMap::new(),
        }
    }

    /// Use `config` for defaults and the endpoint table.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use a custom transport (default: [`ReqwestTransport`]).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn minter(mut self, minter: Arc<dyn KeyMinter>) -> Self {
        self.minter = Some(minter);
        self
    }

    /// Add one entity -> endpoint override on top of the config's table.
    pub fn endpoint(mut self, entity: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(entity.into(), endpoint.into());
        self
    }

    /// Build the `Fetcher`. Fails if the config does not validate.
    pub fn build(self) -> Result<Fetcher> {
        self.config.validate()?;
        let defaults = self.config.request_defaults()?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let mut executor = RequestExecutor::new(transport, defaults);
        if let Some(minter) = self.minter {
            executor = executor.with_minter(minter);
        }
        let executor = Arc::new(executor);

        let mut table: EndpointTable = self.config.endpoints;
        table.extend(self.endpoints);
        let table = Arc::new(table);

        let router = |method| EntityRouter::new(method, Arc::clone(&executor), Arc::clone(&table));

        Ok(Fetcher {
            http: HttpVerbs::new(Arc::clone(&executor)),
            get: router(Method::Get),
            post: router(Method::Post),
            put: router(Method::Put),
            drop: router(Method::Delete),
            executor,
        })
    }
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
