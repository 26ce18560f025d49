//! Query-string serialization.

/// Serialize `params` into a `?`-prefixed, `&`-joined query string.
///
/// Returns an empty string when there are no parameters. Keys and values are
/// form-urlencoded; pair order is preserved.
pub fn serialize_query(params: &[(String, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    format!("?{}", encoded)
}
