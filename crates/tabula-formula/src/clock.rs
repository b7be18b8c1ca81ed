//! Time source for `NOW()` and `TODAY()`

use chrono::{NaiveDate, NaiveDateTime};

/// Source of the current local date and time
pub trait Clock: Send + Sync {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock stopped at a fixed instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Create a fixed clock, or `None` if the components don't form a valid instant
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(hour, min, sec)
            .map(FixedClock)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
