use chrono::{Datelike, Local, NaiveDate, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref WEEK_KEY_REGEX: Regex = Regex::new(r"^(\d{4})-W(\d{2})$").unwrap();
}

/// ISO year-week naming one sheet of the workbook, rendered `YYYY-Www`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    year: i32,
    week: u32,
}

impl WeekKey {
    /// Returns `None` when `week` does not exist in that ISO year.
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
        Some(WeekKey { year, week })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        WeekKey {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// The week containing today's local date.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn parse(key: &str) -> Option<Self> {
        let caps = WEEK_KEY_REGEX.captures(key.trim())?;
        let year = caps[1].parse().ok()?;
        let week = caps[2].parse().ok()?;
        Self::new(year, week)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    pub fn monday(&self) -> NaiveDate {
        // `new` and `from_date` only build weeks that exist.
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).unwrap_or_default()
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-W{:02}", self.year, self.week)
    }
}
