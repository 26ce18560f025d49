//! Naive English pluralization for entity names.

/// Pluralize `word`.
///
/// Words already ending in `s` are returned unchanged, a trailing `y` becomes
/// `ies`, anything else gets an `s` appended.
pub fn pluralize(word: &str) -> String {
    if word.ends_with('s') {
        return word.to_string();
    }
    match word.strip_suffix('y') {
        Some(stem) => format!("{}ies", stem),
        None => format!("{}s", word),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize_rules() {
        assert_eq!(pluralize("product"), "products");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("users"), "users");
        assert_eq!(pluralize(""), "s");
    }
}
