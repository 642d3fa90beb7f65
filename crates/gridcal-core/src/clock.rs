use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Source of the current instant.
///
/// Everything that needs "now" (default viewing date, today markers, past
/// event fading) takes a clock so callers can pin it.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn now_in(&self, tz: Tz) -> DateTime<Tz> {
        self.now().with_timezone(&tz)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
