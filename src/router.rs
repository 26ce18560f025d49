//! Verb and entity routing.
//!
//! [`HttpVerbs`] pins the method of a request. [`EntityRouter`] additionally
//! turns an entity name into an endpoint: a configured table entry wins,
//! otherwise the pluralized name is used (`category` -> `categories`).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::executor::{Failure, RequestExecutor, Success};
use crate::request::{Method, RequestPayload};
use crate::utils::pluralize;

/// Name -> endpoint overrides for entity routing.
pub type EndpointTable = HashMap<String, String>;

/// Fixed-method front door over [`RequestExecutor::request`].
#[derive(Clone)]
pub struct HttpVerbs {
    executor: Arc<RequestExecutor>,
}

impl HttpVerbs {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Send `payload` with `method`. The method is written into the request
    /// options, so it wins over any method the payload carries.
    pub async fn verb(
        &self,
        method: Method,
        mut payload: RequestPayload,
    ) -> Result<Success, Failure> {
        payload.options.method = Some(method);
        self.executor.request(payload).await
    }

    pub async fn get(&self, payload: RequestPayload) -> Result<Success, Failure> {
        self.verb(Method::Get, payload).await
    }

    pub async fn post(&self, payload: RequestPayload) -> Result<Success, Failure> {
        self.verb(Method::Post, payload).await
    }

    pub async fn put(&self, payload: RequestPayload) -> Result<Success, Failure> {
        self.verb(Method::Put, payload).await
    }

    pub async fn delete(&self, payload: RequestPayload) -> Result<Success, Failure> {
        self.verb(Method::Delete, payload).await
    }
}

/// Routes entity names to endpoints for one HTTP verb.
#[derive(Clone)]
pub struct EntityRouter {
    method: Method,
    http: HttpVerbs,
    endpoints: Arc<EndpointTable>,
}

impl EntityRouter {
    pub fn new(method: Method, executor: Arc<RequestExecutor>, endpoints: Arc<EndpointTable>) -> Self {
        Self {
            method,
            http: HttpVerbs::new(executor),
            endpoints,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Endpoint for `entity`: the table entry if present, else its plural.
    pub fn resolve_endpoint(&self, entity: &str) -> String {
        match self.endpoints.get(entity) {
            Some(endpoint) => endpoint.clone(),
            None => pluralize(entity),
        }
    }

    /// A callable bound to `entity`.
    pub fn entity(&self, entity: &str) -> EntityCall<'_> {
        EntityCall {
            router: self,
            endpoint: self.resolve_endpoint(entity),
        }
    }

    /// Resolve `entity` and send `payload` to it with this router's verb.
    /// Any `path` on the payload is replaced by the resolved endpoint.
    pub async fn dispatch(
        &self,
        entity: &str,
        payload: RequestPayload,
    ) -> Result<Success, Failure> {
        self.entity(entity).call(payload).await
    }

    /// Send `payload` as-is with this router's verb; the caller supplies the
    /// path. No name resolution happens.
    pub async fn invoke(&self, payload: RequestPayload) -> Result<Success, Failure> {
        self.http.verb(self.method, payload).await
    }
}

/// An entity name already resolved to its endpoint.
pub struct EntityCall<'a> {
    router: &'a EntityRouter,
    endpoint: String,
}

impl EntityCall<'_> {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call(&self, mut payload: RequestPayload) -> Result<Success, Failure> {
        debug!(method = %self.router.method, endpoint = %self.endpoint, "Entity request");
        payload.path = Some(self.endpoint.clone());
        self.router.http.verb(self.router.method, payload).await
    }
}
