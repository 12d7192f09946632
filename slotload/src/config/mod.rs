//! Engine configuration.
//!
//! Configuration is grouped per concern ([`PoolConfig`], [`QueueConfig`],
//! [`CacheConfig`]) under one [`EngineConfig`], built either in code with
//! `with_*` methods or loaded from an INI file.
//!
//! ```
//! use slotload::config::{CacheConfig, EngineConfig, PoolConfig};
//!
//! let config = EngineConfig::default()
//!     .with_pool(PoolConfig::default().with_primary_threads(4))
//!     .with_cache(CacheConfig::default().with_disk_enabled(false));
//! assert_eq!(config.pool.effective_fallback_threads(), 3);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;

pub use defaults::{
    default_cache_dir, default_fallback_threads, default_primary_threads, num_cpus,
    DEFAULT_DISK_CACHE_SIZE, DEFAULT_MEMORY_CACHE_SIZE, DEFAULT_WRITE_THREADS,
    MIN_PRIMARY_THREADS,
};
pub use file::{config_file_path, ConfigFileError};
pub use settings::{CacheConfig, EngineConfig, PoolConfig, QueueConfig};
pub use size::{format_size, parse_size, SizeParseError};
