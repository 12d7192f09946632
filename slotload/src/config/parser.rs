//! INI parsing logic for converting `Ini` → `EngineConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::ConfigFileError;
use super::settings::EngineConfig;
use super::size::parse_size;
use crate::queue::QueuePolicy;

/// Parse an `Ini` object into an `EngineConfig`.
///
/// Starts from `EngineConfig::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<EngineConfig, ConfigFileError> {
    let mut config = EngineConfig::default();

    // [pool] section
    if let Some(section) = ini.section(Some("pool")) {
        if let Some(v) = get_parsed::<usize>(section, "pool", "primary_threads", POSITIVE)? {
            config.pool.primary_threads = require_positive("pool", "primary_threads", v)?;
        }
        if let Some(v) = get_parsed::<usize>(section, "pool", "fallback_threads", POSITIVE)? {
            config.pool.fallback_threads = Some(require_positive("pool", "fallback_threads", v)?);
        }
    }

    // [queue] section
    if let Some(section) = ini.section(Some("queue")) {
        if let Some(v) = section.get("policy") {
            config.queue.policy =
                QueuePolicy::from_str(v).map_err(|_| ConfigFileError::InvalidValue {
                    section: "queue".to_string(),
                    key: "policy".to_string(),
                    value: v.to_string(),
                    reason: "must be 'fifo' or 'lifo'".to_string(),
                })?;
        }
        if let Some(ms) = get_parsed::<u64>(section, "queue", "high_timeout_ms", MILLIS)? {
            config.queue.timeouts.high = Duration::from_millis(ms);
        }
        if let Some(ms) = get_parsed::<u64>(section, "queue", "normal_timeout_ms", MILLIS)? {
            config.queue.timeouts.normal = Duration::from_millis(ms);
        }
        if let Some(ms) = get_parsed::<u64>(section, "queue", "low_timeout_ms", MILLIS)? {
            config.queue.timeouts.low = Duration::from_millis(ms);
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = get_parsed::<bool>(section, "cache", "memory_enabled", BOOLEAN)? {
            config.cache.memory_enabled = v;
        }
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_max_bytes = parse_size_value("cache", "memory_size", v)?;
        }
        if let Some(v) = get_parsed::<bool>(section, "cache", "disk_enabled", BOOLEAN)? {
            config.cache.disk_enabled = v;
        }
        if let Some(v) = section.get("disk_size") {
            config.cache.disk_max_bytes = parse_size_value("cache", "disk_size", v)?;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = get_parsed::<usize>(section, "cache", "write_threads", POSITIVE)? {
            config.cache.write_threads = require_positive("cache", "write_threads", v)?;
        }
        if let Some(v) = get_parsed::<u64>(section, "cache", "stats_interval", SECONDS)? {
            config.cache.stats_interval_secs = v;
        }
        if let Some(v) = get_parsed::<bool>(section, "cache", "write_through", BOOLEAN)? {
            config.cache.write_through = v;
        }
    }

    Ok(config)
}

const POSITIVE: &str = "must be a positive integer";
const MILLIS: &str = "must be a non-negative integer (milliseconds)";
const SECONDS: &str = "must be a non-negative integer (seconds, 0 disables)";
const BOOLEAN: &str = "must be 'true' or 'false'";

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Reads and parses a key if present.
fn get_parsed<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    props
        .get(key)
        .map(|v| {
            v.trim()
                .to_ascii_lowercase()
                .parse::<T>()
                .map_err(|_| invalid(section, key, v, reason))
        })
        .transpose()
}

fn require_positive(section: &str, key: &str, value: usize) -> Result<usize, ConfigFileError> {
    if value == 0 {
        return Err(invalid(section, key, "0", POSITIVE));
    }
    Ok(value)
}

fn parse_size_value(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    parse_size(value).map_err(|_| {
        invalid(
            section,
            key,
            value,
            "expected format like '1GB', '64MB', or '512KB'",
        )
    })
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<EngineConfig, ConfigFileError> {
        parse_ini(&Ini::load_from_str(content).unwrap())
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_all_sections() {
        let config = parse(
            r#"
[pool]
primary_threads = 6
fallback_threads = 2

[queue]
policy = LIFO
high_timeout_ms = 40
normal_timeout_ms = 20
low_timeout_ms = 5

[cache]
memory_enabled = false
memory_size = 32MB
disk_enabled = true
disk_size = 1GB
directory = /var/cache/slotload
write_threads = 3
stats_interval = 60
write_through = false
"#,
        )
        .unwrap();

        assert_eq!(config.pool.primary_threads, 6);
        assert_eq!(config.pool.fallback_threads, Some(2));
        assert_eq!(config.queue.policy, QueuePolicy::Lifo);
        assert_eq!(config.queue.timeouts.high, Duration::from_millis(40));
        assert_eq!(config.queue.timeouts.normal, Duration::from_millis(20));
        assert_eq!(config.queue.timeouts.low, Duration::from_millis(5));
        assert!(!config.cache.memory_enabled);
        assert_eq!(config.cache.memory_max_bytes, 32 * 1024 * 1024);
        assert_eq!(config.cache.disk_max_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.cache.directory, PathBuf::from("/var/cache/slotload"));
        assert_eq!(config.cache.write_threads, 3);
        assert_eq!(config.cache.stats_interval_secs, 60);
        assert!(!config.cache.write_through);
    }

    #[test]
    fn test_invalid_size_names_the_key() {
        let err = parse("[cache]\nmemory_size = lots\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "cache");
                assert_eq!(key, "memory_size");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(parse("[pool]\nprimary_threads = 0\n").is_err());
        assert!(parse("[cache]\nwrite_threads = 0\n").is_err());
    }

    #[test]
    fn test_invalid_policy_and_bool() {
        assert!(parse("[queue]\npolicy = random\n").is_err());
        assert!(parse("[cache]\ndisk_enabled = maybe\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/assets");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("assets"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
