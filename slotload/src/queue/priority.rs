//! Priority classes and insertion policy.

use std::fmt;
use std::time::Duration;

/// Default poll timeout for the high class.
pub const DEFAULT_HIGH_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Default poll timeout for the normal class.
pub const DEFAULT_NORMAL_POLL_TIMEOUT: Duration = Duration::from_millis(25);

/// Default poll timeout for the low class.
pub const DEFAULT_LOW_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Request priority class.
///
/// Ordered so that `High > Normal > Low`. Draining always tries the highest
/// non-empty class first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// All classes, highest first (drain order).
    pub const DRAIN_ORDER: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Normal => write!(f, "NORMAL"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Where new items land within their class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Append at the tail; oldest request drains first.
    #[default]
    Fifo,
    /// Insert at the head; newest request drains first. Suits scrolling
    /// lists, where the most recently bound slot is the one on screen.
    Lifo,
}

impl std::str::FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            other => Err(format!("unknown queue policy '{}'", other)),
        }
    }
}

/// Per-class poll timeouts used when falling through to the next class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeouts {
    pub high: Duration,
    pub normal: Duration,
    pub low: Duration,
}

impl PollTimeouts {
    pub fn for_priority(&self, priority: Priority) -> Duration {
        match priority {
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }
}

impl Default for PollTimeouts {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_POLL_TIMEOUT,
            normal: DEFAULT_NORMAL_POLL_TIMEOUT,
            low: DEFAULT_LOW_POLL_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_drain_order_is_descending() {
        let order = Priority::DRAIN_ORDER;
        assert!(order.windows(2).all(|w| w[0] > w[1]));
        for (i, p) in order.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("FIFO".parse::<QueuePolicy>(), Ok(QueuePolicy::Fifo));
        assert_eq!(" lifo ".parse::<QueuePolicy>(), Ok(QueuePolicy::Lifo));
        assert!("random".parse::<QueuePolicy>().is_err());
    }

    #[test]
    fn test_timeouts_lookup() {
        let t = PollTimeouts::default();
        assert_eq!(t.for_priority(Priority::High), DEFAULT_HIGH_POLL_TIMEOUT);
        assert_eq!(t.for_priority(Priority::Low), DEFAULT_LOW_POLL_TIMEOUT);
    }
}
