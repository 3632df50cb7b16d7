//! Injectable wall clock.
//!
//! All time comparisons in the control plane go through a single `Clock`
//! so tests can pin "now". Timestamps are serialized as ISO-8601 UTC.

use std::sync::RwLock;

use chrono::{DateTime, SecondsFormat, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// ISO-8601 UTC with millisecond precision, the platform's stored
    /// timestamp format.
    fn now_iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock pinned to a settable instant.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().expect("clock lock") = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.now.write().expect("clock lock");
        *guard += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_format_is_utc_with_millis() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap());
        assert_eq!(clock.now_iso(), "2026-03-01T12:30:05.000Z");
    }

    #[test]
    fn fixed_clock_advances() {
        use chrono::Timelike;
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        clock.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now().hour(), 2);
    }
}
