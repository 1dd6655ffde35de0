mod snapshots;

use chrono::NaiveDate;
pub use snapshots::*;

/// Inclusive calendar-date range for snapshot queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}
