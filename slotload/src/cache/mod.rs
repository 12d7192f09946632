//! Two-tier asset cache.
//!
//! ```text
//!   get(key) ──► MemoryCache (LRU, byte bounded)
//!   get_persisted_path(key) ──► DiskCache (blob files, mtime eviction)
//!   cache(key, asset) ──► memory (sync) + writer pool ──► disk (async)
//! ```

mod disk;
mod key;
mod memory;
mod reporter;
mod stats;
mod tiered;
mod types;

pub use disk::DiskCache;
pub use key::{
    CacheKey, DimensionKeyGenerator, FilenameGenerator, HashedFilenameGenerator, KeyGenerator,
    BLOB_EXTENSION,
};
pub use memory::MemoryCache;
pub use reporter::CacheStatsReporter;
pub use stats::{CacheStats, TierStats};
pub use tiered::TieredCacheManager;
pub use types::{CacheError, Tiers};
