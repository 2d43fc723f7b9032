//! Read-through response cache keyed by provider + query fingerprint.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::source::ProviderId;

/// Content-addressable cache key: provider identifier plus a stable
/// fingerprint of the query's canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(provider: ProviderId, fingerprint: &str) -> Self {
        Self(format!("{}:{}", provider.as_str(), fingerprint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase-hex SHA-256 over the given parts, each terminated by a NUL
/// so that part boundaries cannot alias.
///
/// Deliberately not the std hasher: the fingerprint must be identical
/// across processes and runs for logically identical queries.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
}

/// Thread-safe in-memory response cache with per-entry TTL.
///
/// TTL is supplied by the calling client on every `put`; the cache
/// itself has no notion of a default lifetime. Constructed with
/// [`ResponseCache::disabled`], the cache is a pure pass-through:
/// every read misses and every write is a no-op, so clients never have
/// to special-case an absent backend.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Option<Arc<tokio::sync::RwLock<CacheInner>>>,
}

impl ResponseCache {
    pub fn in_memory() -> Self {
        Self {
            inner: Some(Arc::new(tokio::sync::RwLock::new(CacheInner::default()))),
        }
    }

    /// A cache with no backend.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub const fn is_disabled(&self) -> bool {
        self.inner.is_none()
    }

    /// Get a cached payload if present and not expired. An entry is
    /// visible only until `insertion_time + ttl`; after that it is
    /// treated as absent.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let inner = self.inner.as_ref()?;
        let store = inner.read().await;
        store.map.get(key.as_str()).and_then(|entry| {
            if Instant::now() < entry.expires_at {
                Some(entry.payload.clone())
            } else {
                None
            }
        })
    }

    pub async fn put(&self, key: &CacheKey, payload: String, ttl: Duration) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let mut store = inner.write().await;
        store.map.insert(
            key.as_str().to_owned(),
            CacheEntry {
                payload,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove expired entries.
    pub async fn purge_expired(&self) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let now = Instant::now();
        let mut store = inner.write().await;
        store.map.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of stored entries, including any not yet purged expired ones.
    pub async fn len(&self) -> usize {
        match self.inner.as_ref() {
            Some(inner) => inner.read().await.map.len(),
            None => 0,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fp: &str) -> CacheKey {
        CacheKey::new(ProviderId::Wonder, fp)
    }

    #[tokio::test]
    async fn put_then_get_returns_payload() {
        let cache = ResponseCache::in_memory();

        assert!(cache.get(&key("abc")).await.is_none());

        cache
            .put(&key("abc"), String::from("payload"), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get(&key("abc")).await.as_deref(), Some("payload"));

        // Overwrite
        cache
            .put(&key("abc"), String::from("fresher"), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get(&key("abc")).await.as_deref(), Some("fresher"));
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let cache = ResponseCache::in_memory();

        cache
            .put(&key("abc"), String::from("payload"), Duration::from_millis(40))
            .await;
        assert!(cache.get(&key("abc")).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&key("abc")).await.is_none());

        cache.purge_expired().await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn disabled_cache_is_a_pass_through() {
        let cache = ResponseCache::disabled();

        assert!(cache.is_disabled());
        cache
            .put(&key("abc"), String::from("payload"), Duration::from_secs(60))
            .await;
        assert!(cache.get(&key("abc")).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn fingerprint_is_stable_and_part_boundary_sensitive() {
        let a = fingerprint(&["D66", "<request/>"]);
        let b = fingerprint(&["D66", "<request/>"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        // "D6" + "6<request/>" must not alias "D66" + "<request/>".
        assert_ne!(fingerprint(&["D6", "6<request/>"]), a);
    }

    #[test]
    fn keys_embed_the_provider_namespace() {
        let k = CacheKey::new(ProviderId::Ahr, "deadbeef");
        assert_eq!(k.as_str(), "ahr:deadbeef");
    }
}
