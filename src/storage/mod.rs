//! Local durable storage for the reminder store.
//!
//! The scheduler persists a single JSON blob under a fixed key, the same
//! way a browser client would use `localStorage`. Backends only move
//! opaque strings; encoding and tolerant decoding live here.

mod file;
mod memory;
mod migrations;
mod sqlite;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{reminders::ScheduledReminder, settings::NotificationSettings};

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub const DEFAULT_STORAGE_KEY: &str = "revalidation-notifications";

/// Key/value persistence backend. Writes replace the whole value; concurrent
/// writers from other processes are not coordinated (last writer wins).
pub trait ReminderStorage: Send {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, blob: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub notifications: Vec<ScheduledReminder>,
    #[serde(default)]
    pub settings: NotificationSettings,
}

impl PersistedState {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialise reminder store")
    }

    pub fn decode(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).context("failed to parse persisted reminder store")
    }
}

/// Keys become file names and SQLite values, so keep them boring.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("storage key must not be empty");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        || key.starts_with('.')
    {
        anyhow::bail!("storage key '{key}' contains unsupported characters");
    }
    Ok(())
}
