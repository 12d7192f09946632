//! Memory + disk cache coordinator with asynchronous disk write-back.

use crate::asset::{Asset, DecodeSpec};
use crate::cache::disk::DiskCache;
use crate::cache::key::{CacheKey, FilenameGenerator, KeyGenerator};
use crate::cache::memory::MemoryCache;
use crate::cache::reporter::CacheStatsReporter;
use crate::cache::types::{CacheError, Tiers};
use crate::cache::CacheStats;
use crate::config::CacheConfig;
use crate::pool::WorkerPool;
use crate::source::Locator;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Name prefix of the disk writer threads.
const WRITER_POOL_NAME: &str = "slotload-cache-writer";

/// Count of scheduled-but-unfinished disk writes.
#[derive(Default)]
struct PendingWrites {
    count: Mutex<usize>,
    drained: Condvar,
}

impl PendingWrites {
    fn begin(&self) {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            count = self
                .drained
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }
}

/// Two-tier cache for decoded assets.
///
/// Lookup strategy:
/// 1. [`get`](Self::get) checks the memory tier only (synchronous, fast)
/// 2. [`get_persisted_path`](Self::get_persisted_path) checks the disk tier
///    and returns a file path the caller re-loads through the normal
///    decode pipeline
///
/// [`cache`](Self::cache) stores into memory synchronously and hands the
/// disk write to a small writer pool, returning immediately. Either tier can
/// be switched off at runtime; a disabled tier simply misses.
pub struct TieredCacheManager {
    memory: Arc<MemoryCache>,
    disk: Option<Arc<DiskCache>>,
    keys: Arc<dyn KeyGenerator>,
    memory_enabled: AtomicBool,
    disk_enabled: AtomicBool,
    write_through: bool,
    writer: Option<WorkerPool>,
    pending: Arc<PendingWrites>,
    reporter: Mutex<Option<CacheStatsReporter>>,
}

impl TieredCacheManager {
    /// Builds both tiers from configuration.
    ///
    /// The disk tier (and its writer pool) only exists when enabled in
    /// `config`; it cannot be switched on later.
    pub fn new(
        config: &CacheConfig,
        keys: Arc<dyn KeyGenerator>,
        filenames: Arc<dyn FilenameGenerator>,
    ) -> Result<Self, CacheError> {
        if config.disk_enabled && config.directory.as_os_str().is_empty() {
            return Err(CacheError::InvalidConfig(
                "disk cache enabled without a directory".to_string(),
            ));
        }

        let memory = Arc::new(MemoryCache::new(config.memory_max_bytes));

        let (disk, writer) = if config.disk_enabled {
            let disk = Arc::new(DiskCache::new(
                config.directory.clone(),
                config.disk_max_bytes,
                filenames,
            )?);
            let writer = WorkerPool::new(WRITER_POOL_NAME, config.write_threads)?;
            (Some(disk), Some(writer))
        } else {
            (None, None)
        };

        let reporter = if config.stats_interval_secs > 0 {
            Some(CacheStatsReporter::start(
                Arc::clone(&memory),
                disk.clone(),
                Duration::from_secs(config.stats_interval_secs),
            )?)
        } else {
            None
        };

        info!(
            memory_enabled = config.memory_enabled,
            memory_limit = config.memory_max_bytes,
            disk_enabled = disk.is_some(),
            disk_limit = config.disk_max_bytes,
            dir = %config.directory.display(),
            "Cache initialized"
        );

        Ok(Self {
            memory,
            disk,
            keys,
            memory_enabled: AtomicBool::new(config.memory_enabled),
            disk_enabled: AtomicBool::new(config.disk_enabled),
            write_through: config.write_through,
            writer,
            pending: Arc::new(PendingWrites::default()),
            reporter: Mutex::new(reporter),
        })
    }

    /// Derives the cache key for a request.
    pub fn key_for(&self, locator: &Locator, spec: &DecodeSpec) -> CacheKey {
        self.keys.generate(locator, spec)
    }

    /// Memory-tier lookup.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Asset>> {
        if !self.is_memory_enabled() {
            return None;
        }
        self.memory.get(key)
    }

    /// Disk-tier lookup.
    pub fn get_persisted_path(&self, key: &CacheKey) -> Option<PathBuf> {
        if !self.is_disk_enabled() {
            return None;
        }
        self.disk.as_ref()?.get_path(key)
    }

    /// Stores an asset in every enabled tier.
    pub fn cache(&self, key: &CacheKey, asset: &Arc<Asset>) {
        self.cache_in(key, asset, Tiers::ALL);
    }

    /// Stores an asset in the requested tiers that are also enabled.
    ///
    /// The memory write is synchronous; the disk write is queued on the
    /// writer pool and this returns without waiting for it. Without
    /// write-through, an asset the memory tier took is not written to disk.
    pub fn cache_in(&self, key: &CacheKey, asset: &Arc<Asset>, tiers: Tiers) {
        let in_memory = tiers.memory && self.is_memory_enabled();
        if in_memory {
            self.memory.put(key.clone(), Arc::clone(asset));
        }
        if tiers.disk && self.is_disk_enabled() && (self.write_through || !in_memory) {
            self.schedule_disk_write(key.clone(), Arc::clone(asset));
        }
    }

    fn schedule_disk_write(&self, key: CacheKey, asset: Arc<Asset>) {
        let (Some(disk), Some(writer)) = (self.disk.as_ref(), self.writer.as_ref()) else {
            return;
        };

        let disk = Arc::clone(disk);
        let pending = Arc::clone(&self.pending);
        pending.begin();

        let job_pending = Arc::clone(&pending);
        let submitted = writer.execute(Box::new(move || {
            if let Err(e) = disk.put_sync(&key, &asset) {
                error!(key = %key, error = %e, "Disk cache write failed");
            }
            job_pending.finish();
        }));

        if let Err(e) = submitted {
            pending.finish();
            debug!(error = %e, "Disk write dropped, writer pool is shut down");
        }
    }

    /// Blocks until every queued disk write has finished or `timeout`
    /// elapses. Returns true if the queue drained.
    pub fn wait_for_writes(&self, timeout: Duration) -> bool {
        self.pending.wait_drained(timeout)
    }

    /// Disk writes queued or in progress.
    pub fn pending_writes(&self) -> usize {
        self.pending.get()
    }

    /// Empties the memory tier. Returns the number of entries dropped.
    pub fn evict_memory(&self) -> usize {
        let removed = self.memory.clear();
        info!(removed, "Evicted memory cache");
        removed
    }

    /// Empties the disk tier. Returns the number of files deleted.
    ///
    /// Writes still queued at this point land afterwards.
    pub fn evict_persistent(&self) -> Result<usize, CacheError> {
        let Some(disk) = self.disk.as_ref() else {
            return Ok(0);
        };
        let removed = disk.clear()?;
        info!(removed, "Evicted disk cache");
        Ok(removed)
    }

    pub fn set_memory_enabled(&self, enabled: bool) {
        self.memory_enabled.store(enabled, Ordering::Release);
    }

    /// Has no effect when the disk tier was not configured.
    pub fn set_disk_enabled(&self, enabled: bool) {
        self.disk_enabled.store(enabled, Ordering::Release);
    }

    pub fn is_memory_enabled(&self) -> bool {
        self.memory_enabled.load(Ordering::Acquire)
    }

    pub fn is_disk_enabled(&self) -> bool {
        self.disk.is_some() && self.disk_enabled.load(Ordering::Acquire)
    }

    pub fn memory(&self) -> &Arc<MemoryCache> {
        &self.memory
    }

    pub fn disk(&self) -> Option<&Arc<DiskCache>> {
        self.disk.as_ref()
    }

    /// Combined statistics of both tiers.
    pub fn stats(&self) -> CacheStats {
        let disk = self
            .disk
            .as_ref()
            .map(|d| d.stats())
            .unwrap_or_default();
        CacheStats::combine(&self.memory.stats(), &disk)
    }

    /// Stops the stats reporter and the writer pool. Writes already queued
    /// still complete.
    pub fn shutdown(&self) {
        if let Some(reporter) = self
            .reporter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            reporter.shutdown();
        }
        if let Some(writer) = self.writer.as_ref() {
            writer.shutdown();
        }
    }
}

impl Drop for TieredCacheManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
