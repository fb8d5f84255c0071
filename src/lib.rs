pub mod cli;
pub mod config;
pub mod reminders;
pub mod settings;
pub mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

pub use cli::{run_cli, Cli};
pub use config::AppConfig;
pub use reminders::{
    LogNotifier, NewReminder, Notifier, Permission, ReminderCategory, ReminderPriority,
    ReminderScheduler, ScheduledReminder,
};
pub use settings::NotificationSettings;
pub use storage::{JsonFileStorage, MemoryStorage, ReminderStorage, SqliteStorage};

pub fn run() -> Result<()> {
    // Info by default; RUST_LOG overrides
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(run_cli(cli))
}
