//! Default request headers.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::request::RequestOptions;

/// Headers every outgoing request starts from. Caller headers are merged
/// over these by the executor.
pub fn default_headers(_options: &RequestOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}
