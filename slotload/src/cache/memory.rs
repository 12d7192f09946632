//! In-memory cache with LRU eviction.

use crate::asset::Asset;
use crate::cache::key::CacheKey;
use crate::cache::CacheStats;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

#[derive(Debug)]
struct CacheEntry {
    asset: Arc<Asset>,
    size: usize,
    /// Access tick for LRU ordering; higher is more recent.
    last_accessed: u64,
    access_count: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    size_bytes: usize,
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Byte-bounded memory tier holding decoded assets.
///
/// Entries are shared as `Arc<Asset>`, so a hit never copies pixel data.
/// When an insert would push the total over the limit, least recently used
/// entries are evicted first. An asset larger than the whole limit is not
/// stored.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
    stats: Mutex<CacheStats>,
}

impl MemoryCache {
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size_bytes,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Looks up an asset, refreshing its LRU position on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Asset>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let tick = inner.next_tick();

        let hit = inner.entries.get_mut(key).map(|entry| {
            entry.last_accessed = tick;
            entry.access_count += 1;
            Arc::clone(&entry.asset)
        });
        drop(inner);

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.memory.record_lookup(hit.is_some());
        if hit.is_some() {
            trace!(key = %key, "Memory cache hit");
        }
        hit
    }

    /// Inserts or replaces an asset. Returns false if it was too large to
    /// store.
    pub fn put(&self, key: CacheKey, asset: Arc<Asset>) -> bool {
        let size = asset.byte_size();
        if size > self.max_size_bytes {
            debug!(key = %key, size, limit = self.max_size_bytes, "Asset larger than memory cache, not stored");
            return false;
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = inner.entries.remove(&key) {
            inner.size_bytes = inner.size_bytes.saturating_sub(old.size);
        }

        let target = self.max_size_bytes - size;
        let evicted = Self::evict_lru_until(&mut inner, target);

        let tick = inner.next_tick();
        inner.entries.insert(
            key,
            CacheEntry {
                asset,
                size,
                last_accessed: tick,
                access_count: 0,
            },
        );
        inner.size_bytes += size;

        let (size_bytes, count) = (inner.size_bytes, inner.entries.len());
        drop(inner);

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.memory.record_evictions(evicted);
        stats.memory.set_footprint(size_bytes, count);
        true
    }

    /// Evicts oldest entries until the total is at most `target` bytes.
    fn evict_lru_until(inner: &mut Inner, target: usize) -> u64 {
        if inner.size_bytes <= target {
            return 0;
        }

        let mut order: Vec<(u64, CacheKey)> = inner
            .entries
            .iter()
            .map(|(k, e)| (e.last_accessed, k.clone()))
            .collect();
        order.sort_unstable_by_key(|(tick, _)| *tick);

        let mut evicted = 0;
        for (_, key) in order {
            if inner.size_bytes <= target {
                break;
            }
            if let Some(entry) = inner.entries.remove(&key) {
                inner.size_bytes = inner.size_bytes.saturating_sub(entry.size);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .contains_key(key)
    }

    /// Removes one entry. Returns true if it was present.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = inner.entries.remove(key) else {
            return false;
        };
        inner.size_bytes = inner.size_bytes.saturating_sub(entry.size);
        let (size_bytes, count) = (inner.size_bytes, inner.entries.len());
        drop(inner);

        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .memory
            .set_footprint(size_bytes, count);
        true
    }

    pub fn entry_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn size_bytes(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drops every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.size_bytes = 0;
        drop(inner);

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.memory.record_evictions(removed as u64);
        stats.memory.set_footprint(0, 0);
        removed
    }
}
