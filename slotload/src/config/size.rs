//! Human-readable size parsing (e.g., "64MB", "1GB").

use thiserror::Error;

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '1GB', '64MB', or '512KB'")]
pub struct SizeParseError {
    input: String,
}

/// Parse a human-readable size string into bytes.
///
/// Accepts bare numbers (bytes) and case-insensitive `K`/`KB`, `M`/`MB`,
/// `G`/`GB` suffixes (powers of 1024), with optional whitespace.
///
/// ```
/// use slotload::config::parse_size;
///
/// assert_eq!(parse_size("512KB").unwrap(), 512 * 1024);
/// assert_eq!(parse_size("64 mb").unwrap(), 64 * 1024 * 1024);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let trimmed = s.trim();
    let err = || SizeParseError {
        input: s.to_string(),
    };

    let upper = trimmed.to_ascii_uppercase();
    let (digits, multiplier) = [("GB", GB), ("G", GB), ("MB", MB), ("M", MB), ("KB", KB), ("K", KB)]
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, *mult)))
        .unwrap_or((upper.as_str(), 1));

    let digits = digits.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(err());
    }

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(err)
}

/// Format a byte count for logs.
///
/// Exact multiples print without decimals (`64MB`); other values get one
/// decimal place in the largest fitting unit (`1.5MB`).
pub fn format_size(bytes: usize) -> String {
    for (unit, size) in [("GB", GB), ("MB", MB), ("KB", KB)] {
        if bytes >= size {
            return if bytes % size == 0 {
                format!("{}{}", bytes / size, unit)
            } else {
                format!("{:.1}{}", bytes as f64 / size as f64, unit)
            };
        }
    }
    format!("{}B", bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("1k").unwrap(), KB);
        assert_eq!(parse_size("1KB").unwrap(), KB);
        assert_eq!(parse_size("64MB").unwrap(), 64 * MB);
        assert_eq!(parse_size("64m").unwrap(), 64 * MB);
        assert_eq!(parse_size("1GB").unwrap(), GB);
        assert_eq!(parse_size("  2 G ").unwrap(), 2 * GB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("2TB").is_err());
        assert!(parse_size("-1GB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("+4").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(KB), "1KB");
        assert_eq!(format_size(64 * MB), "64MB");
        assert_eq!(format_size(MB + MB / 2), "1.5MB");
        assert_eq!(format_size(2 * GB), "2GB");
    }

    proptest! {
        /// Property: whole-unit sizes survive format → parse.
        #[test]
        fn prop_whole_units_round_trip(n in 1usize..1024, unit in 0usize..3) {
            let bytes = n * [KB, MB, GB][unit];
            prop_assert_eq!(parse_size(&format_size(bytes)).unwrap(), bytes);
        }
    }
}
