//! Decoder lookup by locator prefix.

use super::{BlobFileDecoder, Decoder};
use crate::error::LoadError;
use crate::source::{Locator, FILE_SCHEME};
use std::sync::Arc;
use tracing::debug;

/// Immutable prefix → decoder table.
///
/// Resolution picks the longest registered prefix that matches the
/// locator, so `https://cdn.example.com/` can override a generic
/// `https://` decoder. Bare absolute paths resolve as `file://`.
#[derive(Clone)]
pub struct DecoderRegistry {
    // Sorted by descending prefix length.
    entries: Vec<(String, Arc<dyn Decoder>)>,
}

impl DecoderRegistry {
    pub fn builder() -> DecoderRegistryBuilder {
        DecoderRegistryBuilder::default()
    }

    /// Finds the decoder for a locator.
    pub fn resolve(&self, locator: &Locator) -> Result<Arc<dyn Decoder>, LoadError> {
        let raw = locator.as_str();
        let normalized;
        let lookup = if raw.starts_with('/') {
            normalized = format!("{}{}", FILE_SCHEME, raw);
            normalized.as_str()
        } else {
            raw
        };

        self.entries
            .iter()
            .find(|(prefix, _)| lookup.starts_with(prefix.as_str()))
            .map(|(prefix, decoder)| {
                debug!(locator = %locator, prefix = %prefix, "Resolved decoder");
                Arc::clone(decoder)
            })
            .ok_or_else(|| LoadError::Unsupported(format!("no decoder registered for {}", locator)))
    }

    /// Registered prefixes, longest first.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("prefixes", &self.prefixes().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`DecoderRegistry`].
///
/// The blob file decoder is registered for `file://` unless another decoder
/// is registered for that exact prefix or [`without_defaults`] is used.
///
/// [`without_defaults`]: DecoderRegistryBuilder::without_defaults
pub struct DecoderRegistryBuilder {
    entries: Vec<(String, Arc<dyn Decoder>)>,
    defaults: bool,
}

impl Default for DecoderRegistryBuilder {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            defaults: true,
        }
    }
}

impl DecoderRegistryBuilder {
    /// Registers a decoder for a prefix, replacing any earlier registration
    /// of the same prefix.
    pub fn register(mut self, prefix: impl Into<String>, decoder: Arc<dyn Decoder>) -> Self {
        let prefix = prefix.into();
        self.entries.retain(|(p, _)| *p != prefix);
        self.entries.push((prefix, decoder));
        self
    }

    /// Skips the built-in `file://` decoder.
    pub fn without_defaults(mut self) -> Self {
        self.defaults = false;
        self
    }

    pub fn build(mut self) -> DecoderRegistry {
        if self.defaults && !self.entries.iter().any(|(p, _)| p == FILE_SCHEME) {
            self.entries
                .push((FILE_SCHEME.to_string(), Arc::new(BlobFileDecoder)));
        }
        self.entries
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        DecoderRegistry {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::decode::DecodeRequest;
    use crate::listener::ProgressSink;

    struct Tagged(u32);

    impl Decoder for Tagged {
        fn decode(
            &self,
            _request: &DecodeRequest<'_>,
            _progress: &dyn ProgressSink,
        ) -> Result<Asset, LoadError> {
            Ok(Asset::image(self.0, 1, vec![0u8; self.0 as usize]))
        }
    }

    fn tag_of(registry: &DecoderRegistry, locator: &str) -> Option<u32> {
        let decoder = registry.resolve(&Locator::new(locator)).ok()?;
        let locator = Locator::new(locator);
        let cancel = tokio_util::sync::CancellationToken::new();
        let request = DecodeRequest {
            locator: &locator,
            spec: Default::default(),
            cancel: &cancel,
        };
        decoder
            .decode(&request, &crate::listener::NoProgress)
            .ok()
            .map(|a| a.width())
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = DecoderRegistry::builder()
            .register("https://", Arc::new(Tagged(1)))
            .register("https://cdn.example.com/", Arc::new(Tagged(2)))
            .build();

        assert_eq!(tag_of(&registry, "https://other.org/a.png"), Some(1));
        assert_eq!(tag_of(&registry, "https://cdn.example.com/a.png"), Some(2));
    }

    #[test]
    fn test_missing_decoder_is_unsupported() {
        let registry = DecoderRegistry::builder().without_defaults().build();
        assert!(registry.is_empty());
        let err = registry
            .resolve(&Locator::new("content://media/1"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Unsupported(_)));
    }

    #[test]
    fn test_file_default_is_registered() {
        let registry = DecoderRegistry::default();
        assert_eq!(registry.prefixes().collect::<Vec<_>>(), vec![FILE_SCHEME]);
        assert!(registry.resolve(&Locator::new("file:///tmp/a.blob")).is_ok());
        assert!(registry.resolve(&Locator::new("/tmp/a.blob")).is_ok());
    }

    #[test]
    fn test_file_default_can_be_overridden() {
        let registry = DecoderRegistry::builder()
            .register(FILE_SCHEME, Arc::new(Tagged(9)))
            .build();
        assert_eq!(registry.len(), 1);
        assert_eq!(tag_of(&registry, "/tmp/a.blob"), Some(9));
    }

    #[test]
    fn test_reregistering_prefix_replaces() {
        let registry = DecoderRegistry::builder()
            .without_defaults()
            .register("asset://", Arc::new(Tagged(1)))
            .register("asset://", Arc::new(Tagged(3)))
            .build();
        assert_eq!(registry.len(), 1);
        assert_eq!(tag_of(&registry, "asset://icons/a"), Some(3));
    }
}
