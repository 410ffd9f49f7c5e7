//! Next-month shift schedule listing.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use std::fmt;

/// Japanese single-character weekday labels, Monday first.
const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// One calendar day of the generated schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday: Weekday,
}

impl ScheduleEntry {
    fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            weekday: date.weekday(),
        }
    }

    pub fn weekday_label(&self) -> &'static str {
        WEEKDAY_LABELS[self.weekday.num_days_from_monday() as usize]
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}月{}日 ({}) 00:00 ~ 00:00",
            self.month,
            self.day,
            self.weekday_label()
        )
    }
}

/// Every day of the month following `today`'s month, in order.
///
/// Pure in `today`: callers pass the request's captured date. Returns an
/// empty list only at the end of chrono's representable range.
pub fn next_month_schedule(today: NaiveDate) -> Vec<ScheduleEntry> {
    let Some(first) = today
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(1)))
    else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|d| d.month() == first.month())
        .map(ScheduleEntry::from_date)
        .collect()
}

/// One line per entry, newline-separated.
pub fn format_schedule(entries: &[ScheduleEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
