//! Load requests and their immediate outcome.

use super::future::LoadFuture;
use crate::asset::{Asset, DecodeSpec};
use crate::listener::LoadListener;
use crate::queue::Priority;
use crate::source::Locator;
use std::fmt;
use std::sync::Arc;

/// One request to load an asset.
///
/// ```
/// use slotload::engine::LoadRequest;
/// use slotload::queue::Priority;
///
/// let request = LoadRequest::new("http://example.com/a.png")
///     .with_priority(Priority::High)
///     .cancel_predecessor();
/// assert!(request.cancels_predecessor());
/// ```
#[derive(Clone)]
pub struct LoadRequest {
    locator: Locator,
    spec: Option<DecodeSpec>,
    priority: Priority,
    cancel_predecessor: bool,
    listener: Option<Arc<dyn LoadListener>>,
    skip_memory_cache: bool,
    skip_disk_cache: bool,
}

impl LoadRequest {
    pub fn new(locator: impl Into<Locator>) -> Self {
        Self {
            locator: locator.into(),
            spec: None,
            priority: Priority::Normal,
            cancel_predecessor: false,
            listener: None,
            skip_memory_cache: false,
            skip_disk_cache: false,
        }
    }

    /// Overrides the decode spec. Without one, display loads use the
    /// target's dimensions and detached loads decode at natural size.
    pub fn with_spec(mut self, spec: DecodeSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Cancels any other in-flight load for the same slot once this one is
    /// handed to a worker pool.
    pub fn cancel_predecessor(mut self) -> Self {
        self.cancel_predecessor = true;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn LoadListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Neither reads from nor writes to the memory tier.
    pub fn skip_memory_cache(mut self) -> Self {
        self.skip_memory_cache = true;
        self
    }

    /// Neither reads from nor writes to the disk tier.
    pub fn skip_disk_cache(mut self) -> Self {
        self.skip_disk_cache = true;
        self
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn spec(&self) -> Option<DecodeSpec> {
        self.spec
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn cancels_predecessor(&self) -> bool {
        self.cancel_predecessor
    }

    pub fn listener(&self) -> Option<&Arc<dyn LoadListener>> {
        self.listener.as_ref()
    }

    pub fn skips_memory_cache(&self) -> bool {
        self.skip_memory_cache
    }

    pub fn skips_disk_cache(&self) -> bool {
        self.skip_disk_cache
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("locator", &self.locator)
            .field("spec", &self.spec)
            .field("priority", &self.priority)
            .field("cancel_predecessor", &self.cancel_predecessor)
            .field("has_listener", &self.listener.is_some())
            .field("skip_memory_cache", &self.skip_memory_cache)
            .field("skip_disk_cache", &self.skip_disk_cache)
            .finish()
    }
}

/// What happened to a request at submission time.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Served from the memory tier and delivered before returning.
    Cached(Arc<Asset>),
    /// Queued for decoding.
    Scheduled(Arc<LoadFuture>),
}

impl LoadOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// The future of a scheduled load.
    pub fn future(&self) -> Option<&Arc<LoadFuture>> {
        match self {
            Self::Scheduled(future) => Some(future),
            Self::Cached(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = LoadRequest::new("file:///tmp/a.blob");
        assert_eq!(request.locator().as_str(), "file:///tmp/a.blob");
        assert_eq!(request.priority(), Priority::Normal);
        assert!(request.spec().is_none());
        assert!(!request.cancels_predecessor());
        assert!(request.listener().is_none());
        assert!(!request.skips_memory_cache());
        assert!(!request.skips_disk_cache());
    }

    #[test]
    fn test_builder_methods() {
        let request = LoadRequest::new("http://host/a")
            .with_spec(DecodeSpec::new(10, 20))
            .with_priority(Priority::Low)
            .skip_memory_cache()
            .skip_disk_cache();

        assert_eq!(request.spec(), Some(DecodeSpec::new(10, 20)));
        assert_eq!(request.priority(), Priority::Low);
        assert!(request.skips_memory_cache());
        assert!(request.skips_disk_cache());
        assert!(format!("{:?}", request).contains("has_listener: false"));
    }

    #[test]
    fn test_cached_outcome_has_no_future() {
        let outcome = LoadOutcome::Cached(Arc::new(Asset::image(1, 1, vec![0u8; 4])));
        assert!(outcome.is_cached());
        assert!(outcome.future().is_none());
    }
}
