//! External key-value cache interface (§6) and the in-tree memory backend.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::IpxError;

/// Cached element: the encoded bytes plus the format/meta needed to replay
/// the response without re-running the pipeline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub inserted_at: Instant,
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() >= ttl,
            None => false,
        }
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;
    async fn set(&self, key: &str, entry: CacheEntry);
}

/// In-process cache, backed by a mutex-guarded map; no eviction policy
/// beyond lazy expiry on read since nothing in this service bounds entry
/// count the way an LRU would need to.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            },
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().insert(key.to_string(), entry);
    }
}

/// Constructs the configured backend. `Redis` is named in configuration
/// (§6) but not shipped in-tree; selecting it fails fast rather than
/// silently falling back to memory.
pub fn build_backend(config: &crate::config::CacheConfig) -> Result<Option<Box<dyn CacheBackend>>, IpxError> {
    match config {
        crate::config::CacheConfig::Disabled => Ok(None),
        crate::config::CacheConfig::Memory => Ok(Some(Box::new(MemoryCache::new()))),
        crate::config::CacheConfig::Redis { host } => {
            Err(IpxError::internal(format!("Redis cache backend ({}) is not implemented in this build", host)))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bytes: &[u8]) -> CacheEntry {
        CacheEntry { bytes: bytes.to_vec(), content_type: "image/png".to_string(), width: 1, height: 1, inserted_at: Instant::now(), ttl: None }
    }

    #[tokio::test]
    async fn stores_and_retrieves() {
        let cache = MemoryCache::new();
        cache.set("k", entry(b"abc")).await;
        let got = cache.get("k").await.unwrap();
        assert_eq!(got.bytes, b"abc");
    }

    #[tokio::test]
    async fn expires_after_ttl() {
        let cache = MemoryCache::new();
        let mut e = entry(b"abc");
        e.ttl = Some(Duration::from_millis(0));
        cache.set("k", e).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[test]
    fn redis_selection_fails_fast() {
        let config = crate::config::CacheConfig::Redis { host: "redis://x".to_string() };
        assert!(build_backend(&config).is_err());
    }
}
