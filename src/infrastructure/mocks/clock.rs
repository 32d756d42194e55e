//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of rate limiting windows and license expiry.
///
/// # Examples
///
/// ```
/// use license_gate::infrastructure::mocks::MockClock;
/// use license_gate::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::at_unix(1_700_000_000);
/// assert_eq!(clock.unix_seconds(), 1_700_000_000);
///
/// // Advance time explicitly
/// clock.advance(Duration::from_secs(61));
/// assert_eq!(clock.unix_seconds(), 1_700_000_061);
///
/// // Or jump to a calendar date
/// clock.set_date(2024, 3, 10);
/// assert_eq!(clock.today().to_string(), "2024-03-10");
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a mock clock at a Unix timestamp in seconds.
    pub fn at_unix(seconds: i64) -> Self {
        Self::new(unix(seconds))
    }

    /// Create a mock clock at midnight UTC of a calendar date.
    pub fn at_date(year: i32, month: u32, day: u32) -> Self {
        Self::new(midnight(year, month, day))
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).expect("duration out of range");
        let mut time = self.lock();
        *time += step;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    /// Set the clock to midnight UTC of a calendar date.
    pub fn set_date(&self, year: i32, month: u32, day: u32) {
        self.set(midnight(year, month, day));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        self.current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

fn unix(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .expect("timestamp out of range")
}

fn midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("invalid calendar date")
        .and_utc()
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}
