//! Reminder data models.
//!
//! - `ScheduledReminder`: one stored reminder, serialised camelCase with RFC 3339 dates.
//! - `NewReminder`: caller input for `ReminderScheduler::schedule`.
//! - `ReminderState`: lifecycle position, derived from the reminder and a wall-clock instant.

use std::fmt;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReminderCategory {
    Revalidation,
    Progress,
    Deadline,
    Cpd,
    Reflection,
}

impl ReminderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderCategory::Revalidation => "revalidation",
            ReminderCategory::Progress => "progress",
            ReminderCategory::Deadline => "deadline",
            ReminderCategory::Cpd => "cpd",
            ReminderCategory::Reflection => "reflection",
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort key only. Variant order gives `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum ReminderPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl ReminderPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderPriority::Low => "low",
            ReminderPriority::Medium => "medium",
            ReminderPriority::High => "high",
        }
    }
}

impl fmt::Display for ReminderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReminder {
    pub id: String,
    pub title: String,
    pub message: String,
    pub category: ReminderCategory,
    pub due_at: DateTime<Utc>,
    pub owner_id: String,
    /// Only ever flipped false -> true, by `ReminderScheduler::acknowledge`.
    pub is_read: bool,
    pub priority: ReminderPriority,
}

impl ScheduledReminder {
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        !self.is_read && self.due_at <= now
    }

    pub fn state(&self, now: DateTime<Utc>) -> ReminderState {
        ReminderState::of(self, now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub title: String,
    pub message: String,
    pub category: ReminderCategory,
    pub due_at: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default)]
    pub priority: ReminderPriority,
}

impl NewReminder {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("reminder title is required");
        }
        if self.message.trim().is_empty() {
            bail!("reminder message is required");
        }
        if self.owner_id.trim().is_empty() {
            bail!("reminder owner is required");
        }
        Ok(())
    }

    pub(crate) fn into_scheduled(self, id: String) -> ScheduledReminder {
        ScheduledReminder {
            id,
            title: self.title,
            message: self.message,
            category: self.category,
            due_at: self.due_at,
            owner_id: self.owner_id,
            is_read: false,
            priority: self.priority,
        }
    }
}

/// Evicted reminders are simply absent from the store, so they have no variant here.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReminderState {
    Scheduled,
    Pending,
    Acknowledged,
}

impl ReminderState {
    pub fn of(reminder: &ScheduledReminder, now: DateTime<Utc>) -> Self {
        if reminder.is_read {
            ReminderState::Acknowledged
        } else if reminder.due_at <= now {
            ReminderState::Pending
        } else {
            ReminderState::Scheduled
        }
    }
}
