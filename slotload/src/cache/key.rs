//! Cache key and persisted filename derivation.

use crate::asset::DecodeSpec;
use crate::source::Locator;
use sha2::{Digest, Sha256};
use std::fmt;

/// Extension used for persisted asset blobs.
pub const BLOB_EXTENSION: &str = "blob";

/// Key identifying a decoded asset in both cache tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps a locator and decode spec to a cache key.
///
/// Implementations must be pure: the same inputs always produce the same key.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, locator: &Locator, spec: &DecodeSpec) -> CacheKey;
}

/// Maps a cache key to a filesystem-safe filename.
pub trait FilenameGenerator: Send + Sync {
    fn filename(&self, key: &CacheKey) -> String;
}

/// Default key: `{locator}#{width}x{height}`, with `:still` appended when
/// animation is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionKeyGenerator;

impl KeyGenerator for DimensionKeyGenerator {
    fn generate(&self, locator: &Locator, spec: &DecodeSpec) -> CacheKey {
        let mut key = format!("{}#{}x{}", locator, spec.width, spec.height);
        if !spec.animate {
            key.push_str(":still");
        }
        CacheKey(key)
    }
}

/// Default filename: lowercase SHA-256 hex of the key plus `.blob`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedFilenameGenerator;

impl FilenameGenerator for HashedFilenameGenerator {
    fn filename(&self, key: &CacheKey) -> String {
        let digest = Sha256::digest(key.as_str().as_bytes());
        let mut name = String::with_capacity(digest.len() * 2 + BLOB_EXTENSION.len() + 1);
        for byte in digest {
            name.push_str(&format!("{:02x}", byte));
        }
        name.push('.');
        name.push_str(BLOB_EXTENSION);
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_dimensions() {
        let locator = Locator::new("http://example.com/a.png");
        let a = DimensionKeyGenerator.generate(&locator, &DecodeSpec::new(100, 50));
        let b = DimensionKeyGenerator.generate(&locator, &DecodeSpec::new(200, 50));

        assert_eq!(a.as_str(), "http://example.com/a.png#100x50");
        assert_ne!(a, b);
    }

    #[test]
    fn test_still_spec_gets_distinct_key() {
        let locator = Locator::new("file:///tmp/clip.gif");
        let animated = DimensionKeyGenerator.generate(&locator, &DecodeSpec::new(10, 10));
        let still = DimensionKeyGenerator
            .generate(&locator, &DecodeSpec::new(10, 10).with_animation(false));

        assert_ne!(animated, still);
        assert!(still.as_str().ends_with(":still"));
    }

    #[test]
    fn test_hashed_filename_is_stable_and_safe() {
        let key = CacheKey::new("content://media/external/images/1#64x64");
        let first = HashedFilenameGenerator.filename(&key);
        let second = HashedFilenameGenerator.filename(&key);

        assert_eq!(first, second);
        assert_eq!(first.len(), 64 + 5);
        assert!(first.ends_with(".blob"));
        assert!(first
            .trim_end_matches(".blob")
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_keys_get_different_filenames() {
        let a = HashedFilenameGenerator.filename(&CacheKey::new("a"));
        let b = HashedFilenameGenerator.filename(&CacheKey::new("b"));
        assert_ne!(a, b);
    }
}
