//! Registry of replayable requests, addressable by [`RequestKey`].
//!
//! String keys resolve to an internal [`EntryToken`], and tokens resolve to
//! the stored descriptor. Both maps are strongly owned: an entry lives until
//! [`RequestRegistry::delete`] removes the key and its entry together.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::request::{RequestPayload, StoredRequest};
use crate::utils::{default_minter, KeyMinter, RequestKey};

/// Opaque handle linking a key to its stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntryToken(u64);

/// In-memory store of requests remembered for later replay.
pub struct RequestRegistry {
    tokens: HashMap<RequestKey, EntryToken>,
    entries: HashMap<EntryToken, StoredRequest>,
    next_token: u64,
    minter: Arc<dyn KeyMinter>,
}

impl RequestRegistry {
    pub fn new(minter: Arc<dyn KeyMinter>) -> Self {
        Self {
            tokens: HashMap::new(),
            entries: HashMap::new(),
            next_token: 0,
            minter,
        }
    }

    /// Strip the volatile fields from `payload` and store it.
    ///
    /// Mints a key when `key` is `None`. Storing under an existing key
    /// replaces the previous entry. Returns the key used.
    pub fn store(&mut self, payload: RequestPayload, key: Option<RequestKey>) -> RequestKey {
        let key = key.unwrap_or_else(|| self.minter.mint());
        if let Some(old) = self.tokens.remove(&key) {
            self.entries.remove(&old);
        }
        self.next_token += 1;
        let token = EntryToken(self.next_token);
        self.entries.insert(token, StoredRequest::new(payload));
        self.tokens.insert(key.clone(), token);
        debug!(key = %key, "Stored request");
        key
    }

    pub fn get(&self, key: &str) -> Option<&StoredRequest> {
        self.tokens.get(key).and_then(|t| self.entries.get(t))
    }

    /// Remove `key` and its entry. Returns `true` if an entry existed.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.tokens.remove(key) {
            Some(token) => {
                self.entries.remove(&token);
                debug!(key = %key, "Deleted stored request");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new(default_minter())
    }
}
