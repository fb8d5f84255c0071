//! Reminder offsets before a target date.
//!
//! Month offsets use calendar subtraction: the month field moves back and
//! the day is clamped to the last valid day of the resulting month, so
//! three months before 31 March is 31 December and one month before
//! 31 March is 28 (or 29) February. Day offsets are exact 24-hour blocks.

use chrono::{DateTime, Duration, Months, Utc};

use super::model::ReminderPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderOffset {
    Months(u32),
    Days(i64),
}

impl ReminderOffset {
    /// `None` only when the result would fall outside chrono's representable range.
    pub fn before(&self, target: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            ReminderOffset::Months(months) => target.checked_sub_months(Months::new(months)),
            ReminderOffset::Days(days) => target.checked_sub_signed(Duration::days(days)),
        }
    }

    pub fn label(&self) -> String {
        match *self {
            ReminderOffset::Months(1) => "1 month".to_string(),
            ReminderOffset::Months(months) => format!("{months} months"),
            ReminderOffset::Days(1) => "1 day".to_string(),
            ReminderOffset::Days(days) => format!("{days} days"),
        }
    }
}

/// One entry of the revalidation reminder series.
#[derive(Debug, Clone, Copy)]
pub struct SeriesStep {
    pub offset: ReminderOffset,
    pub priority: ReminderPriority,
}

/// Offsets before registration expiry, furthest first.
pub const REVALIDATION_SERIES: [SeriesStep; 4] = [
    SeriesStep {
        offset: ReminderOffset::Months(6),
        priority: ReminderPriority::Low,
    },
    SeriesStep {
        offset: ReminderOffset::Months(3),
        priority: ReminderPriority::Medium,
    },
    SeriesStep {
        offset: ReminderOffset::Days(60),
        priority: ReminderPriority::High,
    },
    SeriesStep {
        offset: ReminderOffset::Months(1),
        priority: ReminderPriority::High,
    },
];
