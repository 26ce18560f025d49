//! Request key minting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;

/// Opaque identity of a logical request.
pub type RequestKey = String;

/// Source of fresh request keys.
pub trait KeyMinter: Send + Sync {
    /// Return a key distinct from every key this minter returned before.
    fn mint(&self) -> RequestKey;
}

/// Mints `uid-<unix millis>-<sequence>-<tag>` keys.
///
/// Every instance draws from one process-wide sequence, so keys never repeat
/// within a process no matter how many minters exist. The timestamp keeps
/// keys from separate processes apart.
pub struct SequentialKeyMinter {
    tag: String,
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl SequentialKeyMinter {
    pub fn new() -> Self {
        Self::with_tag("$")
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for SequentialKeyMinter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMinter for SequentialKeyMinter {
    fn mint(&self) -> RequestKey {
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
        format!("uid-{}-{}-{}", Utc::now().timestamp_millis(), seq, self.tag)
    }
}

static PROCESS_MINTER: Lazy<Arc<dyn KeyMinter>> =
    Lazy::new(|| Arc::new(SequentialKeyMinter::new()));

/// The minter executors and registries use unless given their own.
pub fn default_minter() -> Arc<dyn KeyMinter> {
    Arc::clone(&PROCESS_MINTER)
}

/// Mint a key from the process-wide minter.
pub fn mint_key() -> RequestKey {
    PROCESS_MINTER.mint()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ten_thousand_keys_are_distinct() {
        let minter = SequentialKeyMinter::new();
        let keys: HashSet<RequestKey> = (0..10_000).map(|_| minter.mint()).collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_key_shape() {
        let minter = SequentialKeyMinter::with_tag("cli");
        let key = minter.mint();
        let parts: Vec<&str> = key.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "uid");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u64>().is_ok());
        assert_eq!(parts[3], "cli");
    }

    #[test]
    fn test_separate_minters_never_collide() {
        let a = SequentialKeyMinter::new();
        let b = SequentialKeyMinter::new();
        let keys: HashSet<RequestKey> = (0..1_000)
            .flat_map(|_| [a.mint(), b.mint(), mint_key()])
            .collect();
        assert_eq!(keys.len(), 3_000);
    }

    #[test]
    fn test_process_minter_never_repeats() {
        let a = mint_key();
        let b = mint_key();
        assert_ne!(a, b);
    }
}
