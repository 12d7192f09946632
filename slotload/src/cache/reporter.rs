//! Background thread that periodically logs cache statistics.

use crate::cache::disk::DiskCache;
use crate::cache::memory::MemoryCache;
use crate::cache::CacheStats;
use crate::config::format_size;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const THREAD_NAME: &str = "slotload-cache-stats";

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.wake.notify_all();
    }

    /// Sleeps until `deadline` or until stopped. Returns true if stopped.
    fn sleep_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = self
                .wake
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }
}

/// Logs tier statistics every `interval` until dropped or shut down.
pub struct CacheStatsReporter {
    handle: Option<JoinHandle<()>>,
    signal: Arc<StopSignal>,
}

impl CacheStatsReporter {
    pub fn start(
        memory: Arc<MemoryCache>,
        disk: Option<Arc<DiskCache>>,
        interval: Duration,
    ) -> io::Result<Self> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                while !thread_signal.sleep_until(next) {
                    Self::log_stats(&memory, disk.as_deref());
                    next += interval;
                }
                debug!("Cache stats reporter stopped");
            })?;

        Ok(Self {
            handle: Some(handle),
            signal,
        })
    }

    /// Emits one event per tier and one for the combined hit rate.
    pub fn log_stats(memory: &MemoryCache, disk: Option<&DiskCache>) {
        let memory_stats = memory.stats();
        info!(
            entries = memory.entry_count(),
            size = %format_size(memory.size_bytes()),
            hits = memory_stats.memory.hits,
            hit_rate = %percent(memory_stats.memory.hit_rate()),
            evictions = memory_stats.memory.evictions,
            "[CACHE] Memory"
        );

        let Some(disk) = disk else {
            return;
        };
        let disk_stats = disk.stats();
        info!(
            entries = disk.entry_count(),
            size = %format_size(disk.size_bytes()),
            limit = %format_size(disk.max_size_bytes()),
            hits = disk_stats.disk.hits,
            hit_rate = %percent(disk_stats.disk.hit_rate()),
            writes = disk_stats.disk_writes,
            failures = disk_stats.disk_write_failures,
            evictions = disk_stats.disk.evictions,
            "[CACHE] Disk"
        );

        let combined = CacheStats::combine(&memory_stats, &disk_stats);
        if combined.total_lookups() > 0 {
            info!(
                hit_rate = %percent(combined.overall_hit_rate()),
                hits = combined.total_hits(),
                requests = combined.total_lookups(),
                "[CACHE] Overall"
            );
        }
    }

    /// Wakes the thread and asks it to exit. Dropping joins it.
    pub fn shutdown(&self) {
        self.signal.stop();
    }
}

impl Drop for CacheStatsReporter {
    fn drop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::cache::key::CacheKey;

    #[test]
    fn test_drop_interrupts_long_interval() {
        let memory = Arc::new(MemoryCache::new(1_000));
        memory.put(CacheKey::new("a"), Arc::new(Asset::image(1, 1, vec![0u8; 4])));

        let reporter =
            CacheStatsReporter::start(Arc::clone(&memory), None, Duration::from_secs(3600))
                .unwrap();

        let started = Instant::now();
        drop(reporter);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stop_signal_times_out_when_not_stopped() {
        let signal = StopSignal::default();
        assert!(!signal.sleep_until(Instant::now() + Duration::from_millis(5)));
        signal.stop();
        assert!(signal.sleep_until(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn test_log_stats_without_disk() {
        let memory = MemoryCache::new(1_000);
        memory.get(&CacheKey::new("missing"));
        CacheStatsReporter::log_stats(&memory, None);
    }
}
