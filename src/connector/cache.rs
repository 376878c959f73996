//! Response caching shared by both connectors.
//!
//! Cache keys are a deterministic md5 hash of the outbound request
//! (method + URL, the URL carrying the query string); values are raw
//! response bodies. Eviction is the cache implementation's concern; the
//! connectors only read and write through the [`ResponseCache`] trait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::connector::ConnectorError;
use crate::utils::{HttpResponse, HttpTransport};

/// Result of a cache lookup
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found
    Miss,

    /// Item was found but has expired
    Expired,
}

/// Storage interface for raw response bodies
pub trait ResponseCache: Send + Sync + std::fmt::Debug {
    /// Look up a cached body
    fn get(&self, key: &str) -> CacheResult<String>;

    /// Store a body under the given key
    fn put(&self, key: &str, body: &str);
}

/// Derive the deterministic cache key for an outbound request.
pub fn cache_key(method: &str, url: &str) -> String {
    let digest = md5::compute(format!("{}|{}", method, url).as_bytes());
    format!("{:x}", digest)
}

/// In-memory TTL cache, suitable for a per-session scope
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryCache {
    /// Create a cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<String> {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return CacheResult::Miss,
        };
        match entries.get(key) {
            Some((stored_at, body)) => {
                if stored_at.elapsed() >= self.ttl {
                    CacheResult::Expired
                } else {
                    CacheResult::Hit(body.clone())
                }
            }
            None => CacheResult::Miss,
        }
    }

    fn put(&self, key: &str, body: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now(), body.to_string()));
        } else {
            tracing::warn!("response cache poisoned; dropping entry");
        }
    }
}

/// Transport wrapper adding read-through response caching.
///
/// Both connectors compose this helper instead of inheriting cache
/// behavior; only successful bodies are written back.
#[derive(Debug, Clone)]
pub struct CachingClient {
    transport: Arc<dyn HttpTransport>,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl CachingClient {
    /// Wrap a transport, optionally with a response cache
    pub fn new(transport: Arc<dyn HttpTransport>, cache: Option<Arc<dyn ResponseCache>>) -> Self {
        Self { transport, cache }
    }

    /// Issue a GET request, serving and populating the cache when
    /// `cacheable` is set.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        cacheable: bool,
    ) -> Result<HttpResponse, ConnectorError> {
        let key = cache_key("GET", url);

        if cacheable {
            if let Some(cache) = &self.cache {
                match cache.get(&key) {
                    CacheResult::Hit(body) => {
                        tracing::debug!(%url, "cache HIT");
                        return Ok(HttpResponse { status: 200, body });
                    }
                    CacheResult::Expired => tracing::debug!(%url, "cache expired"),
                    CacheResult::Miss => tracing::debug!(%url, "cache MISS"),
                }
            }
        }

        let response = self.transport.get(url, headers).await?;

        if cacheable && response.is_success() {
            if let Some(cache) = &self.cache {
                cache.put(&key, &response.body);
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::StubTransport;

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = cache_key("GET", "http://example.com/search?q=any,contains,dogs");
        let b = cache_key("GET", "http://example.com/search?q=any,contains,dogs");
        let c = cache_key("GET", "http://example.com/search?q=any,contains,cats");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_memory_cache_expiry() {
        let cache = MemoryCache::new(Duration::ZERO);
        cache.put("k", "body");
        assert!(matches!(cache.get("k"), CacheResult::Expired));

        let cache = MemoryCache::new(Duration::from_secs(60));
        assert!(matches!(cache.get("k"), CacheResult::Miss));
        cache.put("k", "body");
        match cache.get("k") {
            CacheResult::Hit(body) => assert_eq!(body, "body"),
            _ => panic!("Expected cache hit"),
        }
    }

    #[tokio::test]
    async fn test_caching_client_serves_second_call_from_cache() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, "payload");

        let client = CachingClient::new(
            stub.clone(),
            Some(Arc::new(MemoryCache::new(Duration::from_secs(60)))),
        );

        let first = client.get("http://example.com/x", &[], true).await.unwrap();
        let second = client.get("http://example.com/x", &[], true).await.unwrap();

        assert_eq!(first.body, "payload");
        assert_eq!(second.body, "payload");
        // only one request reached the wire
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_caching_client_skips_cache_for_failures() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(500, "boom");
        stub.push_response(200, "ok");

        let client = CachingClient::new(
            stub.clone(),
            Some(Arc::new(MemoryCache::new(Duration::from_secs(60)))),
        );

        let first = client.get("http://example.com/x", &[], true).await.unwrap();
        assert_eq!(first.status, 500);

        // the failure was not cached, so the next call hits the wire
        let second = client.get("http://example.com/x", &[], true).await.unwrap();
        assert_eq!(second.status, 200);
        assert_eq!(stub.request_count(), 2);
    }

    #[tokio::test]
    async fn test_caching_client_without_cache_passes_through() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, "a");
        stub.push_response(200, "b");

        let client = CachingClient::new(stub.clone(), None);
        client.get("http://example.com/x", &[], true).await.unwrap();
        client.get("http://example.com/x", &[], true).await.unwrap();
        assert_eq!(stub.request_count(), 2);
    }
}
