//! URL path joining.

/// Join a base location and a path with exactly one `/` between non-empty
/// segments. Leading and trailing slashes on each segment are dropped, so
/// `("https://host/", "/items/")` becomes `"https://host/items"`.
pub fn join_path(base: &str, path: &str) -> String {
    [base, path]
        .iter()
        .map(|segment| segment.trim_matches('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_plain() {
        assert_eq!(
            join_path("https://dummyjson.com", "products"),
            "https://dummyjson.com/products"
        );
    }

    #[test]
    fn test_join_normalizes_separators() {
        assert_eq!(join_path("https://h.io/", "/a/b/"), "https://h.io/a/b");
        assert_eq!(join_path("https://h.io//", "//a"), "https://h.io/a");
    }

    #[test]
    fn test_join_empty_path() {
        assert_eq!(join_path("https://h.io/", ""), "https://h.io");
    }

    #[test]
    fn test_join_keeps_inner_segments() {
        assert_eq!(
            join_path("https://h.io/api/v1", "products/categories"),
            "https://h.io/api/v1/products/categories"
        );
    }
}
