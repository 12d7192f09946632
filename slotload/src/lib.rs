//! Slotload - asynchronous asset loading into display slots
//!
//! Loads decoded images and animations into UI slots with priority
//! scheduling, slot-aware staleness suppression and a memory + disk cache.
//! When the same slot is re-requested faster than decoding completes (a
//! list being flung, for instance), older loads are never delivered, and
//! their results are still cached for when the user scrolls back.
//!
//! # High-Level API
//!
//! ```ignore
//! use slotload::engine::{LoadRequest, SlotLoader};
//! use slotload::queue::Priority;
//!
//! let loader = SlotLoader::builder()
//!     .register_decoder("http://", Arc::new(HttpDecoder::new()))
//!     .build()?;
//!
//! loader.display(&row_image, LoadRequest::new(url).with_priority(Priority::High))?;
//! // ...
//! loader.terminate();
//! ```

pub mod asset;
pub mod cache;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod listener;
pub mod logging;
pub mod pool;
pub mod queue;
pub mod source;
pub mod target;
pub mod task;

pub use asset::{Asset, AssetKind, DecodeSpec, Frame};
pub use engine::{LoadFuture, LoadOutcome, LoadRequest, LoadStatus, SlotLoader};
pub use error::{EngineError, ErrorKind, LoadError};
pub use listener::{LoadListener, ProgressSink};
pub use source::{Locator, SourceKind};
pub use target::DisplayTarget;

/// Version of the slotload library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
