use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::{
    reminders::{DisabledNotifier, LogNotifier, Notifier},
    storage::{validate_key, JsonFileStorage, ReminderStorage, SqliteStorage, DEFAULT_STORAGE_KEY},
};

const SQLITE_FILE_NAME: &str = "reminders.sqlite3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifierKind {
    /// Write due reminders to the log.
    Log,
    /// No platform surface; reminders are only visible through queries.
    Disabled,
}

/// Process-level options shared by every command. Each flag falls back to
/// an environment variable.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    #[arg(long, global = true, env = "REMINDERS_DATA_DIR", default_value = "./.revalidation")]
    pub data_dir: PathBuf,

    #[arg(long, global = true, env = "REMINDERS_BACKEND", value_enum, default_value_t = StorageBackend::Json)]
    pub backend: StorageBackend,

    #[arg(long, global = true, env = "REMINDERS_STORAGE_KEY", default_value = DEFAULT_STORAGE_KEY)]
    pub storage_key: String,

    #[arg(long, global = true, env = "REMINDERS_NOTIFIER", value_enum, default_value_t = NotifierKind::Log)]
    pub notifier: NotifierKind,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    pub storage_key: String,
    pub notifier: NotifierKind,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        validate_key(&args.storage_key)
            .with_context(|| format!("invalid --storage-key '{}'", args.storage_key))?;

        let debug = std::env::var("REMINDERS_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            data_dir: args.data_dir.clone(),
            backend: args.backend,
            storage_key: args.storage_key.clone(),
            notifier: args.notifier,
            debug,
        })
    }

    pub fn open_storage(&self) -> Result<Box<dyn ReminderStorage>> {
        let storage: Box<dyn ReminderStorage> = match self.backend {
            StorageBackend::Json => Box::new(JsonFileStorage::new(self.data_dir.clone())?),
            StorageBackend::Sqlite => {
                Box::new(SqliteStorage::new(self.data_dir.join(SQLITE_FILE_NAME))?)
            }
        };
        Ok(storage)
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        match self.notifier {
            NotifierKind::Log => Arc::new(LogNotifier),
            NotifierKind::Disabled => Arc::new(DisabledNotifier),
        }
    }

    /// Heartbeat cadence of `watch`, in ticks.
    pub fn heartbeat_every_ticks(&self) -> u32 {
        if self.debug {
            1
        } else {
            10
        }
    }
}
