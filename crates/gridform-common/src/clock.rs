//! Injectable time source for the volatile functions (TODAY, NOW).
//!
//! Builtins never read ambient time directly; everything goes through a
//! [`Clock`] handed to the evaluation context, so tests pin time with
//! [`FixedClock`].

use chrono::{NaiveDate, NaiveDateTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Reads the local system clock.
#[cfg(feature = "system-clock")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "system-clock")]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Always returns the configured instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: NaiveDateTime,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        FixedClock { at }
    }

    pub fn at_ymd(year: i32, month: u32, day: u32) -> Self {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .expect("valid fixed-clock date")
            .and_hms_opt(0, 0, 0)
            .expect("midnight");
        FixedClock { at: date }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = FixedClock::at_ymd(2024, 6, 1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(clock.now(), clock.now());
    }
}
