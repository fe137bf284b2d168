//! Time source for signature freshness checks.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;

/// A source of "now" in seconds since the UNIX epoch.
#[derive(Debug, Clone, Default)]
pub enum ClockSource {
    /// Reads the wall clock on every call.
    #[default]
    System,

    /// Fixed, settable time shared between clones. For tests and tooling.
    Mock(Arc<AtomicI64>),
}

impl ClockSource {
    pub fn new_mock(now: i64) -> ClockSource {
        ClockSource::Mock(Arc::new(AtomicI64::new(now)))
    }

    /// Returns the number of non-leap seconds since 1970-01-01T00:00:00Z.
    pub fn epoch_seconds(&self) -> i64 {
        match self {
            ClockSource::System => Timestamp::now().as_second(),
            ClockSource::Mock(now) => now.load(SeqCst),
        }
    }

    /// Sets the current time of a mock clock. Has no effect on the system clock.
    pub fn set_time(&self, now: i64) {
        if let ClockSource::Mock(n) = self {
            n.store(now, SeqCst);
        }
    }

    /// Moves a mock clock forward. Has no effect on the system clock.
    pub fn advance(&self, delta: Duration) {
        if let ClockSource::Mock(n) = self {
            let secs = i64::try_from(delta.as_secs()).unwrap_or(i64::MAX);
            n.fetch_add(secs, SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ClockSource;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(ClockSource::System.epoch_seconds() > 1_577_836_800);
    }

    #[test]
    fn mock_clock_is_shared_between_clones() {
        let clock = ClockSource::new_mock(1000);
        let other = clock.clone();
        assert_eq!(other.epoch_seconds(), 1000);

        clock.set_time(2000);
        assert_eq!(other.epoch_seconds(), 2000);

        other.advance(Duration::from_secs(5));
        assert_eq!(clock.epoch_seconds(), 2005);
    }
}
