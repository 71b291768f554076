//! In-memory TTL caches for discovered links and captured oembed documents.
//!
//! [`TtlCache`] is a keyed store where every entry expires a fixed time after
//! it was written. There is no capacity bound and no eviction other than
//! expiry: growth is bounded by the set of addresses actually requested.
//!
//! Two instances are used by [`crate::OembedClient`], with different keys and
//! lifetimes:
//!
//! - [`DiscoveryCache`]: page address -> discovered [`OembedLink`]s (300s)
//! - [`OembedCache`]: resolved oembed request address -> [`CapturedResponse`] (3600s)
//!
//! Time is measured with `tokio::time::Instant`, so tests can drive expiry
//! with a paused runtime clock.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::links::OembedLink;

/// Headers and body of a status-200 oembed response, captured for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    /// Response headers as received.
    pub headers: HeaderMap,
    /// Complete response body.
    pub body: Bytes,
}

/// Cache of discovered links, keyed by page address.
pub type DiscoveryCache = TtlCache<String, Arc<[OembedLink]>>;

/// Cache of captured oembed responses, keyed by resolved request address.
pub type OembedCache = TtlCache<String, CapturedResponse>;

#[derive(Debug, Clone)]
struct TtlEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Keyed store whose entries expire a fixed time after being written.
///
/// Cloning is cheap and shares the underlying store.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    map: Arc<RwLock<HashMap<K, TtlEntry<V>>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            map: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. Expired and absent entries are both a miss.
    pub async fn get(&self, key: &K) -> Option<V> {
        let map = self.map.read().await;
        map.get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub async fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = TtlEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.map.write().await.insert(key, entry);
    }

    /// Remove an entry, returning its value if it had not expired.
    pub async fn remove(&self, key: &K) -> Option<V> {
        let entry = self.map.write().await.remove(key)?;
        (Instant::now() < entry.expires_at).then_some(entry.value)
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.map.write().await;
        let before = map.len();
        map.retain(|_, entry| now < entry.expires_at);
        let removed = before - map.len();
        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    /// Whether the cache holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }

    /// Remove everything.
    pub async fn clear(&self) {
        self.map.write().await.clear();
    }
}
