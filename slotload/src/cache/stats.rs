//! Per-tier cache counters.

use crate::config::format_size;
use std::fmt;
use std::time::{Duration, Instant};

/// Counters for one cache tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Bytes held after the last mutation.
    pub size_bytes: usize,
    pub entries: usize,
}

impl TierStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.lookups())
    }

    pub(crate) fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub(crate) fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    pub(crate) fn set_footprint(&mut self, size_bytes: usize, entries: usize) {
        self.size_bytes = size_bytes;
        self.entries = entries;
    }
}

/// Snapshot of both tiers.
///
/// Each tier keeps its own `CacheStats` and only fills in its half;
/// [`CacheStats::combine`] joins the two halves for reporting.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub memory: TierStats,
    pub disk: TierStats,
    pub disk_writes: u64,
    pub disk_write_failures: u64,
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            memory: TierStats::default(),
            disk: TierStats::default(),
            disk_writes: 0,
            disk_write_failures: 0,
            created_at: Instant::now(),
        }
    }

    /// Memory half from `memory`, disk half from `disk`.
    pub fn combine(memory: &CacheStats, disk: &CacheStats) -> Self {
        Self {
            memory: memory.memory,
            disk: disk.disk,
            disk_writes: disk.disk_writes,
            disk_write_failures: disk.disk_write_failures,
            created_at: memory.created_at.min(disk.created_at),
        }
    }

    /// Lookups answered by either tier.
    ///
    /// A memory miss that falls through to disk is counted once, by the disk
    /// tier.
    pub fn total_hits(&self) -> u64 {
        self.memory.hits + self.disk.hits
    }

    pub fn total_lookups(&self) -> u64 {
        self.total_hits() + self.disk.misses
    }

    pub fn overall_hit_rate(&self) -> f64 {
        ratio(self.total_hits(), self.total_lookups())
    }

    pub fn uptime(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn record_disk_write(&mut self, ok: bool) {
        if ok {
            self.disk_writes += 1;
        } else {
            self.disk_write_failures += 1;
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory {} in {} ({:.1}% hit), disk {} in {} ({:.1}% hit, {} writes, {} failed), overall {:.1}% over {}s",
            self.memory.entries,
            format_size(self.memory.size_bytes),
            self.memory.hit_rate() * 100.0,
            self.disk.entries,
            format_size(self.disk.size_bytes),
            self.disk.hit_rate() * 100.0,
            self.disk_writes,
            self.disk_write_failures,
            self.overall_hit_rate() * 100.0,
            self.uptime().as_secs(),
        )
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
