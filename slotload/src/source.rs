//! Source locators and source-kind classification.

use std::fmt;
use std::path::{Path, PathBuf};

/// Broad category of a source, derived from its locator prefix.
///
/// The kind decides which executor pool a load runs on: network sources
/// may stall for seconds, everything else is expected to be fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Network,
    File,
    Content,
    Asset,
    Unknown,
}

impl SourceKind {
    /// Returns true for sources that may block on slow I/O.
    pub fn is_slow(&self) -> bool {
        matches!(self, Self::Network)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::File => write!(f, "file"),
            Self::Content => write!(f, "content"),
            Self::Asset => write!(f, "asset"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

pub const FILE_SCHEME: &str = "file://";
pub const HTTP_SCHEME: &str = "http://";
pub const HTTPS_SCHEME: &str = "https://";
pub const CONTENT_SCHEME: &str = "content://";
pub const ASSET_SCHEME: &str = "asset://";

/// Identifies where an asset comes from, e.g. `http://host/a.png` or
/// `file:///data/a.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds a `file://` locator for a local path.
    pub fn from_path(path: &Path) -> Self {
        Self(format!("{}{}", FILE_SCHEME, path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the locator by its scheme prefix.
    ///
    /// Bare absolute paths are treated as files.
    pub fn kind(&self) -> SourceKind {
        let s = self.0.as_str();
        if s.starts_with(HTTP_SCHEME) || s.starts_with(HTTPS_SCHEME) {
            SourceKind::Network
        } else if s.starts_with(FILE_SCHEME) || s.starts_with('/') {
            SourceKind::File
        } else if s.starts_with(CONTENT_SCHEME) {
            SourceKind::Content
        } else if s.starts_with(ASSET_SCHEME) {
            SourceKind::Asset
        } else {
            SourceKind::Unknown
        }
    }

    /// Returns the filesystem path for file locators.
    pub fn to_path(&self) -> Option<PathBuf> {
        let s = self.0.as_str();
        if let Some(rest) = s.strip_prefix(FILE_SCHEME) {
            Some(PathBuf::from(rest))
        } else if s.starts_with('/') {
            Some(PathBuf::from(s))
        } else {
            None
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_prefix() {
        assert_eq!(Locator::from("http://a/b.png").kind(), SourceKind::Network);
        assert_eq!(Locator::from("https://a/b.png").kind(), SourceKind::Network);
        assert_eq!(Locator::from("file:///tmp/b.png").kind(), SourceKind::File);
        assert_eq!(Locator::from("/tmp/b.png").kind(), SourceKind::File);
        assert_eq!(Locator::from("content://media/1").kind(), SourceKind::Content);
        assert_eq!(Locator::from("asset://icons/a.gif").kind(), SourceKind::Asset);
        assert_eq!(Locator::from("ftp://x").kind(), SourceKind::Unknown);
    }

    #[test]
    fn test_only_network_is_slow() {
        assert!(SourceKind::Network.is_slow());
        assert!(!SourceKind::File.is_slow());
        assert!(!SourceKind::Content.is_slow());
        assert!(!SourceKind::Asset.is_slow());
    }

    #[test]
    fn test_path_round_trip() {
        let path = Path::new("/var/cache/slotload/abc.blob");
        let locator = Locator::from_path(path);
        assert_eq!(locator.as_str(), "file:///var/cache/slotload/abc.blob");
        assert_eq!(locator.to_path().as_deref(), Some(path));
        assert!(Locator::from("http://x").to_path().is_none());
    }
}
