//! Process-wide, content-addressed cache for generated artifacts (exports,
//! rendered reports, original uploads) that callers want to hand out later
//! by key.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

static GLOBAL: OnceLock<ArtifactCache> = OnceLock::new();

/// Bytes keyed by the lowercase hex SHA-256 of their content.
#[derive(Clone)]
pub struct ArtifactCache {
    entries: Cache<String, Arc<Vec<u8>>>,
}

impl ArtifactCache {
    /// Cache without eviction.
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    /// Cache whose entries expire `ttl` after insertion.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        let mut builder = Cache::<String, Arc<Vec<u8>>>::builder();
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
        }
    }

    pub fn key_for(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }

    /// Stores `content` and returns its key. Inserting the same bytes twice
    /// yields the same key and a single entry.
    pub fn insert(&self, content: Vec<u8>) -> String {
        let key = Self::key_for(&content);
        self.entries.insert(key.clone(), Arc::new(content));
        key
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the process-wide cache. Returns `false` if it was already
/// initialized (the existing cache is kept).
pub fn init_global(ttl: Option<Duration>) -> bool {
    GLOBAL.set(ArtifactCache::with_ttl(ttl)).is_ok()
}

/// The process-wide cache, created without eviction on first use.
pub fn global() -> &'static ArtifactCache {
    GLOBAL.get_or_init(ArtifactCache::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_insert_and_get() {
        let cache = ArtifactCache::new();
        let key = cache.insert(b"report body".to_vec());

        assert_eq!(key.len(), 64);
        assert_eq!(cache.get(&key).unwrap().as_slice(), b"report body");
        assert!(cache.contains(&key));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            ArtifactCache::key_for(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_same_content_same_entry() {
        let cache = ArtifactCache::new();
        let a = cache.insert(b"same".to_vec());
        let b = cache.insert(b"same".to_vec());

        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ArtifactCache::new();
        let a = cache.insert(b"a".to_vec());
        cache.insert(b"b".to_vec());

        assert!(cache.remove(&a));
        assert!(!cache.remove(&a));
        assert!(cache.get(&a).is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_expires_entries() {
        let cache = ArtifactCache::with_ttl(Some(Duration::from_millis(50)));
        let key = cache.insert(b"short lived".to_vec());

        std::thread::sleep(Duration::from_millis(150));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    #[serial]
    fn test_global_is_shared() {
        let key = global().insert(b"shared artifact".to_vec());
        assert!(global().get(&key).is_some());
        assert!(!init_global(None));
        global().remove(&key);
    }
}
