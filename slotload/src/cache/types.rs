//! Cache error type and tier selection.

use crate::pool::PoolError;
use thiserror::Error;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// The background writer pool could not be started
    #[error("Cache writer pool error: {0}")]
    Writer(#[from] PoolError),
}

/// Which tiers a write-back goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiers {
    pub memory: bool,
    pub disk: bool,
}

impl Tiers {
    pub const ALL: Tiers = Tiers {
        memory: true,
        disk: true,
    };
    pub const MEMORY_ONLY: Tiers = Tiers {
        memory: true,
        disk: false,
    };
    pub const NONE: Tiers = Tiers {
        memory: false,
        disk: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.memory && !self.disk
    }
}

impl Default for Tiers {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_constants() {
        assert!(Tiers::NONE.is_empty());
        assert!(!Tiers::MEMORY_ONLY.is_empty());
        assert!(!Tiers::MEMORY_ONLY.disk);
        assert_eq!(Tiers::default(), Tiers::ALL);
    }

    #[test]
    fn test_io_error_converts() {
        let err: CacheError = std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert!(err.to_string().contains("disk gone"));
    }
}
