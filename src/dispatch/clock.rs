//! Source of "now" for a request.
//!
//! The gateway reads the clock once per callback and passes the instant down,
//! so the schedule and date-picker bounds never see two different times.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Wall clock in a fixed timezone.
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock(DateTime<Tz>);

impl FixedClock {
    pub fn new(now: DateTime<Tz>) -> Self {
        Self(now)
    }

    /// Interpret `local` as wall time in `tz`. Ambiguous times take the
    /// earlier offset; nonexistent ones fall back to UTC.
    pub fn at_local(tz: Tz, local: NaiveDateTime) -> Self {
        let now = tz
            .from_local_datetime(&local)
            .earliest()
            .unwrap_or_else(|| Utc.from_utc_datetime(&local).with_timezone(&tz));
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.0
    }
}
