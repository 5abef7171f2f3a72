//! Access-recency monitoring.
//!
//! Decides whether a file has gone unused long enough to be promoted to the
//! Review folder. Filesystems mounted without access-time tracking report no
//! usable timestamp; such files are treated as never stale rather than
//! guessed at.

use std::time::{Duration, SystemTime};

/// Flags files whose last access lies beyond a configured threshold.
#[derive(Debug, Clone, Copy)]
pub struct AccessMonitor {
    threshold: Duration,
}

impl AccessMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Whether a file with the given last-access time qualifies for Review.
    ///
    /// `accessed` is `None` when the filesystem does not report access
    /// times; unknown means never stale. A clock that jumped backwards
    /// (access time in the future) also means not stale.
    pub fn is_stale(&self, accessed: Option<SystemTime>, now: SystemTime) -> bool {
        match accessed {
            Some(atime) => now
                .duration_since(atime)
                .map(|idle| idle >= self.threshold)
                .unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn test_old_file_is_stale() {
        let monitor = AccessMonitor::new(14 * DAY);
        let now = SystemTime::now();
        assert!(monitor.is_stale(Some(now - 60 * DAY), now));
    }

    #[test]
    fn test_recent_file_is_not_stale() {
        let monitor = AccessMonitor::new(14 * DAY);
        let now = SystemTime::now();
        assert!(!monitor.is_stale(Some(now - 2 * DAY), now));
    }

    #[test]
    fn test_threshold_boundary_is_stale() {
        let monitor = AccessMonitor::new(14 * DAY);
        let now = SystemTime::now();
        assert!(monitor.is_stale(Some(now - 14 * DAY), now));
    }

    #[test]
    fn test_unknown_access_time_is_never_stale() {
        let monitor = AccessMonitor::new(14 * DAY);
        assert!(!monitor.is_stale(None, SystemTime::now()));
    }

    #[test]
    fn test_future_access_time_is_not_stale() {
        let monitor = AccessMonitor::new(14 * DAY);
        let now = SystemTime::now();
        assert!(!monitor.is_stale(Some(now + DAY), now));
    }
}
