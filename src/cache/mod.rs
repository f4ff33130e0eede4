//! Embedding Cache (C4): memoises `encode(text)` results keyed by
//! `sha256(model_id || canonical_text)` with TTL expiry and LRU eviction.
//!
//! Grounded on `detectors::cohesion::embeddings::EmbeddingCache` in the
//! teacher codebase (hash-keyed `HashMap` with "evict half at capacity"),
//! generalised to the spec's SHA-256 keying and explicit TTL/LRU contract
//! and made safe for concurrent access via `dashmap` rather than a single
//! `RwLock<HashMap<..>>` (the teacher's cache is single-threaded per
//! extraction run; this one is shared across concurrent requests).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::core::text::canonicalize;

pub use crate::core::config::CacheConfig;

/// SHA-256 digest used as the cache key.
pub type CacheKey = [u8; 32];

/// Derive the cache key for `(model_id, text)`, canonicalising `text` the
/// same way the encoder does so a cache hit always corresponds to a
/// semantically identical request.
pub fn cache_key(model_id: &str, text: &str) -> CacheKey {
    let canonical = canonicalize(text);
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

#[derive(Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: DateTime<Utc>,
}

/// Thread-safe, TTL/LRU-bounded embedding cache.
pub struct EmbeddingCache {
    entries: DashMap<CacheKey, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
    misses: AtomicU64,
    hits: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: config.max_entries,
            ttl: Duration::from_secs((config.ttl_days.max(0) as u64) * 86_400),
            misses: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Look up a vector by key. A cache miss never blocks on anything
    /// beyond the shard lock; an expired entry is lazily removed and
    /// counted as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<f32>> {
        if let Some(entry) = self.entries.get(key) {
            let age = Utc::now().signed_duration_since(entry.inserted_at);
            if age.to_std().unwrap_or(Duration::MAX) <= self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.vector.clone());
            }
        }
        drop(self.entries.remove(key));
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a vector, evicting the oldest entries down to a low-water
    /// mark (half capacity) if storage is at its bound — the same
    /// "evict half at capacity" strategy the teacher's cache uses, applied
    /// in insertion-age order here since the contract requires an actual
    /// LRU policy rather than arbitrary key order.
    pub fn set(&self, key: CacheKey, vector: Vec<f32>) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest(self.max_entries / 2);
        }
        self.entries.insert(
            key,
            CacheEntry {
                vector,
                inserted_at: Utc::now(),
            },
        );
    }

    fn evict_oldest(&self, target_len: usize) {
        if self.entries.len() <= target_len {
            return;
        }
        let mut by_age: Vec<(CacheKey, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
        let to_remove = by_age.len().saturating_sub(target_len);
        for (key, _) in by_age.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }
    }

    /// Number of entries currently stored (including not-yet-expired
    /// ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit rate over the lifetime of this cache instance, for
    /// observability.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
