//! # replayfetch
//!
//! Keyed request orchestration over an HTTP transport:
//!
//! - requests remembered under an opaque key and replayed later
//!   ([`Fetcher::resolve`])
//! - a one-hour response cache keyed by the same identity
//! - per-call timeouts and caller-controlled cancellation
//!   ([`Fetcher::create_request`])
//! - entity routing that maps names like `category` onto REST endpoints
//!
//! ```rust,no_run
//! # tokio_test::block_on(async {
//! use replayfetch::{DeletePolicy, Fetcher, RequestPayload};
//!
//! let fetcher = Fetcher::builder().build().unwrap();
//! let outcome = fetcher
//!     .raw_request(RequestPayload::new().path("products").key("k1").remember(true))
//!     .await;
//! assert!(outcome.is_success());
//!
//! let replayed = fetcher.resolve("k1", DeletePolicy::OnSuccess).await;
//! # });
//! ```

pub mod abort;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod handle;
pub mod registry;
pub mod replay;
pub mod request;
pub mod router;
pub mod transport;
pub mod utils;

pub use abort::{AbortScheduler, AbortSignal};
pub use cache::{CacheEntry, ResponseCache};
pub use client::{Fetcher, FetcherBuilder};
pub use config::Config;
pub use error::{FailureKind, FetchError, Result};
pub use executor::{Failure, Outcome, RequestExecutor, Success};
pub use handle::CancellableRequest;
pub use registry::RequestRegistry;
pub use replay::DeletePolicy;
pub use request::{Method, RequestOptions, RequestPayload, StoredRequest};
pub use router::{EntityRouter, HttpVerbs};
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportRequest};
pub use utils::RequestKey;
