use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::CacheSettings;

/// In-process JSON cache with a per-entry TTL.
///
/// Values are stored as `serde_json::Value` together with their expiry so a
/// single cache can hold price quotes (short TTL) and history series (long
/// TTL) side by side.
#[derive(Clone)]
pub struct CacheService {
    inner: Cache<String, (Value, Instant)>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub status: String,
    pub entry_count: u64,
}

impl CacheService {
    pub fn new(settings: &CacheSettings) -> Self {
        let inner = Cache::builder()
            .max_capacity(settings.max_entries)
            // Entries carry their own expiry; this is the upper bound.
            .time_to_live(Duration::from_secs(settings.history_ttl_seconds.max(1)))
            .build();
        Self { inner }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let (value, expires_at) = self.inner.get(key).await?;
        if Instant::now() >= expires_at {
            self.inner.invalidate(key).await;
            return None;
        }
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Cache entry for {} failed to decode: {}", key, e);
                self.inner.invalidate(key).await;
                None
            }
        }
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(encoded) => {
                self.inner
                    .insert(key.to_string(), (encoded, Instant::now() + ttl))
                    .await;
            }
            Err(e) => warn!("Cache insert for {} failed to encode: {}", key, e),
        }
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            status: "connected".to_string(),
            entry_count: self.inner.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache() -> CacheService {
        CacheService::new(&CacheSettings {
            price_ttl_seconds: 300,
            history_ttl_seconds: 1800,
            max_entries: 100,
        })
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let cache = test_cache();
        cache.insert("price:XLM", &0.12f64, Duration::from_secs(60)).await;
        let value: Option<f64> = cache.get("price:XLM").await;
        assert_eq!(value, Some(0.12));
    }

    #[tokio::test]
    async fn test_expired_entry_is_dropped() {
        let cache = test_cache();
        cache.insert("price:XLM", &0.12f64, Duration::from_secs(0)).await;
        let value: Option<f64> = cache.get("price:XLM").await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = test_cache();
        cache.insert("k", &"v".to_string(), Duration::from_secs(60)).await;
        cache.invalidate("k").await;
        let value: Option<String> = cache.get("k").await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let cache = test_cache();
        let value: Option<String> = cache.get("absent").await;
        assert!(value.is_none());
    }
}
