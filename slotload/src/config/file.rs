//! INI configuration file loading.

use super::settings::EngineConfig;
use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read or is not valid INI.
    #[error("cannot load config: {0}")]
    Unreadable(#[from] ini::Error),

    #[error("[{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl EngineConfig {
    /// Loads configuration from an INI file.
    ///
    /// A missing file yields the defaults. Keys not present in the file keep
    /// their default values.
    ///
    /// ```ini
    /// [pool]
    /// primary_threads = 4
    /// fallback_threads = 2
    ///
    /// [queue]
    /// policy = lifo
    /// high_timeout_ms = 50
    ///
    /// [cache]
    /// memory_size = 64MB
    /// disk_size = 1GB
    /// directory = ~/.cache/myapp/assets
    /// ```
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        match Ini::load_from_file(path) {
            Ok(ini) => super::parser::parse_ini(&ini),
            Err(ini::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parses configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| ConfigFileError::Unreadable(ini::Error::Parse(e)))?;
        super::parser::parse_ini(&ini)
    }
}

/// Default location of the config file (`<config dir>/slotload/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slotload")
        .join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_means_defaults() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_malformed_text_is_unreadable() {
        let err = EngineConfig::from_ini_str("[pool\nprimary_threads = 1").unwrap_err();
        assert!(matches!(err, ConfigFileError::Unreadable(_)));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[pool]\nprimary_threads = 3\n").unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.pool.primary_threads, 3);
        assert_eq!(config.cache, EngineConfig::default().cache);
    }

    #[test]
    fn test_config_file_path() {
        assert!(config_file_path().ends_with("slotload/config.ini"));
    }
}
