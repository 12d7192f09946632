//! Error taxonomy for asset loading.
//!
//! [`LoadError`] is what decoders return and what callers hear about through
//! [`LoadListener::on_failed`](crate::listener::LoadListener::on_failed).
//! [`EngineError`] covers failures of the engine itself (construction,
//! operations after termination).

use crate::cache::CacheError;
use crate::config::ConfigFileError;
use crate::pool::PoolError;
use std::io;
use thiserror::Error;

/// Coarse classification of a [`LoadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Resource, file or cursor absent.
    NotFound,
    /// Wrong field or target type, or no decoder for the source.
    Unsupported,
    /// Network source unreachable.
    NoConnectivity,
    /// Decode ran out of memory.
    OutOfMemory,
    /// I/O interrupted because the load was cancelled.
    Interrupted,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "NotFound"),
            Self::Unsupported => write!(f, "Unsupported"),
            Self::NoConnectivity => write!(f, "NoConnectivity"),
            Self::OutOfMemory => write!(f, "OutOfMemory"),
            Self::Interrupted => write!(f, "Interrupted"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A failed load attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Unsupported source or target: {0}")]
    Unsupported(String),

    #[error("No connectivity: {0}")]
    NoConnectivity(String),

    #[error("Out of memory decoding {requested_bytes} bytes")]
    OutOfMemory { requested_bytes: usize },

    /// Raised by decoders when their cancellation token fires mid-I/O.
    ///
    /// This is the expected outcome of a successful cancellation and is
    /// never reported to listeners.
    #[error("Load interrupted by cancellation")]
    Interrupted,

    #[error("Load failed: {0}")]
    Unknown(String),
}

impl LoadError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::NoConnectivity(_) => ErrorKind::NoConnectivity,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Returns true if this error is the signal of a cancellation rather
    /// than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            io::ErrorKind::Interrupted => Self::Interrupted,
            io::ErrorKind::OutOfMemory => Self::OutOfMemory { requested_bytes: 0 },
            _ => Self::Unknown(err.to_string()),
        }
    }
}

/// Failures of the loading engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was terminated; no further operations are permitted.
    #[error("Loader has been terminated")]
    Terminated,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}
