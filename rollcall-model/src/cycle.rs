use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A `(month, year)` pair identifying one renewal-notification window.
///
/// Memberships whose `membership_expires` falls inside the cycle are the
/// candidate pool for that month's renewal notices.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Cycle {
    pub month: u32,
    pub year: i32,
}

impl Cycle {
    pub fn new(month: u32, year: i32) -> Result<Self, ModelError> {
        if !(1..=12).contains(&month) {
            return Err(ModelError::InvalidMonth(month));
        }
        Ok(Self { month, year })
    }

    /// The cycle a given calendar date belongs to.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.year() == self.year
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cycle_of_date() {
        let cycle = Cycle::of(date(2025, 3, 14));
        assert_eq!(cycle, Cycle::new(3, 2025).unwrap());
    }

    #[test]
    fn contains_matches_month_and_year() {
        let cycle = Cycle::new(3, 2025).unwrap();
        assert!(cycle.contains(date(2025, 3, 1)));
        assert!(cycle.contains(date(2025, 3, 31)));
        assert!(!cycle.contains(date(2025, 4, 1)));
        assert!(!cycle.contains(date(2024, 3, 15)));
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(Cycle::new(0, 2025).is_err());
        assert!(Cycle::new(13, 2025).is_err());
    }
}
