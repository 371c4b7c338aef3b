// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response cache for CoreBrain.
//!
//! Maps a query [`Fingerprint`] to the answer produced for it. Entries
//! expire lazily on read after the TTL, and the least recently used entry
//! is evicted once capacity is exceeded. Any internal failure degrades to a
//! miss; the cache never fails a request.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use corebrain_config::model::CacheConfig;
use corebrain_query::Fingerprint;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

/// What the pipeline stores per fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub answer: String,
    /// The outbound `result` object as first returned.
    pub result: serde_json::Value,
    pub model: String,
    pub created_at: String,
}

struct Entry<V> {
    value: V,
    inserted: Instant,
    tick: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Recency index: tick -> key. The smallest tick is the LRU entry.
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl<V> Inner<V> {
    fn touch(&mut self, key: &str) {
        self.clock += 1;
        let tick = self.clock;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

pub struct ResponseCache<V = CachedAnswer> {
    enabled: bool,
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            enabled: true,
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                clock: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(Duration::from_secs(config.ttl_secs), config.capacity);
        cache.enabled = config.enabled;
        cache
    }

    /// A cache that stores nothing and always misses.
    pub fn disabled() -> Self {
        let mut cache = Self::new(Duration::ZERO, 1);
        cache.enabled = false;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> Option<MutexGuard<'_, Inner<V>>> {
        match self.inner.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("response cache unavailable; treating as miss");
                None
            }
        }
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let key = fingerprint.as_str();
        let Some(mut inner) = self.lock() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let expired = match inner.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.inserted.elapsed() >= self.ttl,
        };
        if expired {
            inner.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = %fingerprint, "cache entry expired");
            return None;
        }

        inner.touch(key);
        self.hits.fetch_add(1, Ordering::Relaxed);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// Insert or overwrite. The last writer for a fingerprint wins.
    pub fn put(&self, fingerprint: &Fingerprint, value: V) {
        if !self.enabled {
            return;
        }
        let key = fingerprint.as_str().to_string();
        let Some(mut inner) = self.lock() else {
            return;
        };

        inner.remove(&key);
        inner.clock += 1;
        let tick = inner.clock;
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
                tick,
            },
        );

        while inner.entries.len() > self.capacity {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.lock()
            .is_some_and(|mut inner| inner.remove(fingerprint.as_str()).is_some())
    }

    pub fn clear(&self) {
        if let Some(mut inner) = self.lock() {
            inner.entries.clear();
            inner.recency.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |inner| inner.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(name: &str) -> Fingerprint {
        Fingerprint::from_raw(name)
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_lazily() {
        let cache: ResponseCache<u32> = ResponseCache::new(Duration::from_secs(60), 8);
        cache.put(&key("a"), 1);
        assert_eq!(cache.get(&key("a")), Some(1));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 1, "expiry happens on read");
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cache: ResponseCache<u32> = ResponseCache::new(Duration::from_secs(60), 2);
        cache.put(&key("a"), 1);
        cache.put(&key("b"), 2);
        assert_eq!(cache.get(&key("a")), Some(1));
        cache.put(&key("c"), 3);

        assert_eq!(cache.get(&key("b")), None);
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.get(&key("c")), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn repeated_put_is_idempotent() {
        let cache: ResponseCache<u32> = ResponseCache::new(Duration::from_secs(60), 2);
        cache.put(&key("a"), 1);
        cache.put(&key("a"), 2);
        cache.put(&key("a"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("a")), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn disabled_cache_always_misses() {
        let cache: ResponseCache<u32> = ResponseCache::disabled();
        cache.put(&key("a"), 1);
        assert_eq!(cache.get(&key("a")), None);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn poisoned_lock_degrades_to_miss() {
        let cache: Arc<ResponseCache<u32>> = Arc::new(ResponseCache::new(Duration::from_secs(60), 4));
        cache.put(&key("a"), 1);

        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the cache lock");
        })
        .join();

        assert_eq!(cache.get(&key("a")), None);
        cache.put(&key("b"), 2);
        assert_eq!(cache.len(), 0);
        assert!(cache.stats().misses >= 1);
    }

    #[test]
    fn concurrent_puts_and_gets_are_safe() {
        let cache: Arc<ResponseCache<usize>> = Arc::new(ResponseCache::new(Duration::from_secs(60), 16));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let k = key(&format!("k{}", (i + t) % 32));
                        cache.put(&k, i);
                        cache.get(&k);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }

    #[test]
    fn config_controls_enablement() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache: ResponseCache = ResponseCache::from_config(&config);
        assert!(!cache.is_enabled());
        assert!(cache.is_empty());
    }
}
