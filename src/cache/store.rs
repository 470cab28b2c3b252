//! Cache Store Module
//!
//! Bounded, TTL-aware map from canonical request path to rendered page.
//!
//! One `RwLock` guards the entry map. Lookups take the read lock; inserts,
//! clears and sweep deletions take the write lock. No lock is ever held
//! across file or network I/O.

use std::collections::HashMap;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheKey, CacheStats};

// == Cache Store ==
/// Shared page cache with capacity bound and TTL or indefinite validity.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Entry lifetime in seconds; `<= 0` means entries never expire by time
    ttl_seconds: i64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `max_entries` - Capacity bound (a value of 0 is treated as 1)
    /// * `ttl_seconds` - Entry lifetime; `<= 0` selects indefinite mode
    pub fn new(max_entries: usize, ttl_seconds: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            ttl_seconds,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// True when entries only leave the store by eviction or invalidation.
    pub fn is_indefinite(&self) -> bool {
        self.ttl_seconds <= 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    // == Get ==
    /// Looks up a key under the read lock.
    ///
    /// Returns the entry whether or not it is still valid; pair with
    /// [`CacheStore::is_valid`].
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    // == Validity ==
    /// True in indefinite mode, otherwise true until the entry's expiry.
    pub fn is_valid(&self, entry: &CacheEntry) -> bool {
        self.is_valid_at(entry, Utc::now())
    }

    pub fn is_valid_at(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        self.is_indefinite() || !entry.is_expired_at(now)
    }

    // == Put ==
    /// Stores freshly rendered content with `expires_at = now + ttl`.
    ///
    /// Returns the key evicted to make room, if any.
    pub async fn put(&self, key: CacheKey, content: impl Into<Bytes>) -> Option<CacheKey> {
        let entry = CacheEntry::new(content, self.ttl_seconds);
        self.put_entry(key, entry).await
    }

    /// Stores a prepared entry, evicting one other entry if the store is full
    /// and `key` is new.
    ///
    /// Eviction picks whichever key the map yields first; no recency or
    /// insertion order is tracked.
    pub async fn put_entry(&self, key: CacheKey, entry: CacheEntry) -> Option<CacheKey> {
        let mut entries = self.entries.write().await;

        let mut evicted = None;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
                self.stats.record_eviction();
                evicted = Some(victim);
            }
        }

        entries.insert(key, entry);
        evicted
    }

    // == Clear ==
    /// Removes every entry. Returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        self.stats.record_invalidation();
        removed
    }

    // == Sweep ==
    /// Removes entries whose expiry has passed at `now`.
    ///
    /// Expired keys are collected under the read lock, then deleted under a
    /// short write lock. A key re-inserted between the two phases carries a
    /// fresh expiry and is left alone. Indefinite stores are never swept.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        if self.is_indefinite() {
            return 0;
        }

        let expired_keys: Vec<CacheKey> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect()
        };

        if expired_keys.is_empty() {
            return 0;
        }

        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for key in expired_keys {
            if entries.get(&key).is_some_and(|entry| entry.is_expired_at(now)) {
                entries.remove(&key);
                removed += 1;
            }
        }
        drop(entries);

        self.stats.record_expired(removed);
        removed
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns true if `key` has an entry, valid or not.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().await.contains_key(key)
    }
}
