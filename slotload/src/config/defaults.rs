//! Default values for engine configuration.

use std::path::PathBuf;

/// Minimum size of the primary worker pool.
pub const MIN_PRIMARY_THREADS: usize = 2;

/// Default memory tier limit (64 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// Default disk tier limit (256 MB).
pub const DEFAULT_DISK_CACHE_SIZE: usize = 256 * 1024 * 1024;

/// Default number of disk writer threads.
pub const DEFAULT_WRITE_THREADS: usize = 2;

/// Directory name under the platform cache dir.
pub const CACHE_DIR_NAME: &str = "slotload";

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Default primary pool size: one thread per core, at least two.
pub fn default_primary_threads() -> usize {
    num_cpus().max(MIN_PRIMARY_THREADS)
}

/// Default fallback pool size for a given primary size: half plus one.
pub fn default_fallback_threads(primary: usize) -> usize {
    primary.max(1) / 2 + 1
}

/// Default disk tier directory (`<platform cache dir>/slotload`).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CACHE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_has_floor() {
        assert!(default_primary_threads() >= MIN_PRIMARY_THREADS);
    }

    #[test]
    fn test_fallback_sizing() {
        assert_eq!(default_fallback_threads(8), 5);
        assert_eq!(default_fallback_threads(3), 2);
        assert_eq!(default_fallback_threads(0), 1);
    }

    #[test]
    fn test_cache_dir_ends_with_crate_name() {
        assert!(default_cache_dir().ends_with(CACHE_DIR_NAME));
    }
}
