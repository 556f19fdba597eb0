//! Injected lookup cache.
//!
//! The search engine itself is stateless. Collaborators that repeatedly read a
//! rarely changing value from storage (such as the name of the default tag
//! category) take a `&dyn Cache` and are responsible for invalidating the keys
//! they own when the value changes.

use parking_lot::RwLock;
use std::collections::HashMap;

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Process-local cache backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// A cache that never holds anything; every read goes to storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _value: String) {}

    fn remove(&self, _key: &str) {}
}

#[cfg(test)]
mod tests {
    use super::{Cache, MemoryCache, NoCache};

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();

        assert_eq!(None, cache.get("k"));
        cache.put("k", "v".to_string());
        assert_eq!(Some("v".to_string()), cache.get("k"));
        cache.remove("k");
        assert_eq!(None, cache.get("k"));
    }

    #[test]
    fn test_no_cache() {
        NoCache.put("k", "v".to_string());
        assert_eq!(None, NoCache.get("k"));
    }
}
