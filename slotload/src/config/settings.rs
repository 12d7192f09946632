//! Engine configuration structs.

use super::defaults::*;
use crate::queue::{PollTimeouts, QueuePolicy};
use std::path::PathBuf;
use std::time::Duration;

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Primary pool size; every network load and most local loads run here.
    pub primary_threads: usize,
    /// Fallback pool size; `None` means half the primary plus one.
    pub fallback_threads: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            primary_threads: default_primary_threads(),
            fallback_threads: None,
        }
    }
}

impl PoolConfig {
    pub fn with_primary_threads(mut self, threads: usize) -> Self {
        self.primary_threads = threads;
        self
    }

    pub fn with_fallback_threads(mut self, threads: usize) -> Self {
        self.fallback_threads = Some(threads);
        self
    }

    /// Fallback size with the default applied, at least one.
    pub fn effective_fallback_threads(&self) -> usize {
        self.fallback_threads
            .unwrap_or_else(|| default_fallback_threads(self.primary_threads))
            .max(1)
    }
}

/// Request queue behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueConfig {
    pub policy: QueuePolicy,
    pub timeouts: PollTimeouts,
}

impl QueueConfig {
    pub fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeouts(mut self, timeouts: PollTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Uses the same poll timeout for every class.
    pub fn with_uniform_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = PollTimeouts {
            high: timeout,
            normal: timeout,
            low: timeout,
        };
        self
    }
}

/// Cache tier settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub memory_enabled: bool,
    pub memory_max_bytes: usize,
    pub disk_enabled: bool,
    pub disk_max_bytes: usize,
    /// Directory holding persisted blobs
    pub directory: PathBuf,
    /// Threads writing to the disk tier
    pub write_threads: usize,
    /// Interval of the stats reporter; 0 disables it
    pub stats_interval_secs: u64,
    /// Write results to disk even when they went to memory. When false the
    /// disk tier only receives results the memory tier did not take.
    pub write_through: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_bytes: DEFAULT_MEMORY_CACHE_SIZE,
            disk_enabled: true,
            disk_max_bytes: DEFAULT_DISK_CACHE_SIZE,
            directory: default_cache_dir(),
            write_threads: DEFAULT_WRITE_THREADS,
            stats_interval_secs: 0,
            write_through: true,
        }
    }
}

impl CacheConfig {
    pub fn with_memory_enabled(mut self, enabled: bool) -> Self {
        self.memory_enabled = enabled;
        self
    }

    pub fn with_memory_max_bytes(mut self, bytes: usize) -> Self {
        self.memory_max_bytes = bytes;
        self
    }

    pub fn with_disk_enabled(mut self, enabled: bool) -> Self {
        self.disk_enabled = enabled;
        self
    }

    pub fn with_disk_max_bytes(mut self, bytes: usize) -> Self {
        self.disk_max_bytes = bytes;
        self
    }

    pub fn with_directory(mut self, dir: PathBuf) -> Self {
        self.directory = dir;
        self
    }

    pub fn with_write_threads(mut self, threads: usize) -> Self {
        self.write_threads = threads;
        self
    }

    pub fn with_stats_interval(mut self, secs: u64) -> Self {
        self.stats_interval_secs = secs;
        self
    }

    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }
}

/// Complete engine configuration. Read-only once the engine is built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub pool: PoolConfig,
    pub queue: QueueConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.pool.primary_threads >= MIN_PRIMARY_THREADS);
        assert_eq!(config.pool.fallback_threads, None);
        assert_eq!(config.queue.policy, QueuePolicy::Fifo);
        assert_eq!(config.queue.timeouts.high, Duration::from_millis(50));
        assert_eq!(config.queue.timeouts.normal, Duration::from_millis(25));
        assert_eq!(config.queue.timeouts.low, Duration::from_millis(10));
        assert!(config.cache.memory_enabled);
        assert!(config.cache.disk_enabled);
        assert_eq!(config.cache.memory_max_bytes, 64 * 1024 * 1024);
        assert_eq!(config.cache.disk_max_bytes, 256 * 1024 * 1024);
        assert_eq!(config.cache.write_threads, 2);
        assert_eq!(config.cache.stats_interval_secs, 0);
        assert!(config.cache.write_through);
    }

    #[test]
    fn test_effective_fallback_threads() {
        let pool = PoolConfig::default().with_primary_threads(6);
        assert_eq!(pool.effective_fallback_threads(), 4);
        assert_eq!(pool.with_fallback_threads(0).effective_fallback_threads(), 1);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::default()
            .with_pool(PoolConfig::default().with_primary_threads(3))
            .with_queue(
                QueueConfig::default()
                    .with_policy(QueuePolicy::Lifo)
                    .with_uniform_timeout(Duration::from_millis(5)),
            )
            .with_cache(
                CacheConfig::default()
                    .with_disk_enabled(false)
                    .with_directory(PathBuf::from("/tmp/slotload"))
                    .with_stats_interval(30),
            );

        assert_eq!(config.pool.primary_threads, 3);
        assert_eq!(config.queue.policy, QueuePolicy::Lifo);
        assert_eq!(config.queue.timeouts.low, Duration::from_millis(5));
        assert!(!config.cache.disk_enabled);
        assert_eq!(config.cache.directory, PathBuf::from("/tmp/slotload"));
        assert_eq!(config.cache.stats_interval_secs, 30);
    }
}
