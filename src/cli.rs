use std::{collections::HashSet, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::Serialize;
use serde_json::json;
use tokio::time::{self, MissedTickBehavior};

use crate::{
    config::{AppConfig, ConfigArgs},
    reminders::{
        NewReminder, Notifier, PlatformNotification, ReminderCategory, ReminderPriority,
        ReminderScheduler,
    },
    settings::SettingsPatch,
};

#[derive(Debug, Parser)]
#[command(name = "reminders")]
#[command(about = "NMC revalidation reminders")]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a single reminder.
    Schedule(ScheduleArgs),
    /// Create the 6 month / 3 month / 60 day / 1 month series before registration expiry.
    Series(SeriesArgs),
    /// Create a progress check-in one week from now.
    Weekly(OwnerArgs),
    /// Create an alert ahead of a deadline.
    Deadline(DeadlineArgs),
    /// Due, unread reminders in delivery order.
    Pending(OwnerArgs),
    /// Every stored reminder of an owner.
    List(OwnerArgs),
    /// Mark one reminder as read.
    Ack(IdArgs),
    /// Lifecycle state of one reminder: scheduled, pending or acknowledged.
    State(IdArgs),
    /// Mark every pending reminder of an owner as read.
    AckAll(OwnerArgs),
    /// Evict read reminders past the retention window.
    Sweep,
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Stay running and surface reminders as they fall due.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct OwnerArgs {
    #[arg(long)]
    owner: String,
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    message: String,
    #[arg(long, value_enum)]
    category: CategoryArg,
    /// RFC 3339 instant or YYYY-MM-DD (midnight UTC).
    #[arg(long)]
    due: String,
    #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
    priority: PriorityArg,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[arg(long)]
    owner: String,
    /// Registration expiry, RFC 3339 instant or YYYY-MM-DD.
    #[arg(long)]
    expiry: String,
}

#[derive(Debug, Args)]
pub struct DeadlineArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    deadline: String,
    #[arg(long, default_value_t = 7)]
    days_before: u32,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set(SettingsSetArgs),
}

#[derive(Debug, Args)]
pub struct SettingsSetArgs {
    #[arg(long)]
    enabled: Option<bool>,
    #[arg(long)]
    revalidation_reminders: Option<bool>,
    #[arg(long)]
    weekly_progress: Option<bool>,
    #[arg(long)]
    deadline_alerts: Option<bool>,
    #[arg(long)]
    browser_notifications: Option<bool>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[arg(long)]
    owner: String,
    #[arg(long, env = "REMINDERS_WATCH_INTERVAL_SECS", default_value_t = 60)]
    interval_secs: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Revalidation,
    Progress,
    Deadline,
    Cpd,
    Reflection,
}

impl From<CategoryArg> for ReminderCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Revalidation => ReminderCategory::Revalidation,
            CategoryArg::Progress => ReminderCategory::Progress,
            CategoryArg::Deadline => ReminderCategory::Deadline,
            CategoryArg::Cpd => ReminderCategory::Cpd,
            CategoryArg::Reflection => ReminderCategory::Reflection,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for ReminderPriority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => ReminderPriority::Low,
            PriorityArg::Medium => ReminderPriority::Medium,
            PriorityArg::High => ReminderPriority::High,
        }
    }
}

/// Accepts a full RFC 3339 instant or a bare calendar date (midnight UTC).
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!("invalid date '{value}': expected RFC 3339 or YYYY-MM-DD")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let config = AppConfig::from_args(&cli.config)?;
    let storage = config.open_storage()?;
    let mut scheduler =
        ReminderScheduler::new(storage, config.notifier(), config.storage_key.clone());

    run_command(&mut scheduler, &config, cli.command).await
}

pub async fn run_command(
    scheduler: &mut ReminderScheduler,
    config: &AppConfig,
    command: Command,
) -> Result<()> {
    let now = Utc::now();

    match command {
        Command::Schedule(args) => {
            let input = NewReminder {
                title: args.title,
                message: args.message,
                category: args.category.into(),
                due_at: parse_instant(&args.due)?,
                owner_id: args.owner,
                priority: args.priority.into(),
            };
            input.validate()?;
            let id = scheduler.schedule(input);
            print_json(&json!({ "id": id }))
        }
        Command::Series(args) => {
            let expiry = parse_instant(&args.expiry)?;
            let ids = scheduler.schedule_revalidation_series(expiry, &args.owner, now);
            print_json(&json!({ "created": ids }))
        }
        Command::Weekly(args) => {
            let id = scheduler.schedule_weekly_progress(&args.owner, now);
            print_json(&json!({ "id": id }))
        }
        Command::Deadline(args) => {
            let deadline = parse_instant(&args.deadline)?;
            let id = scheduler.schedule_deadline_alert(
                &args.owner,
                &args.title,
                deadline,
                args.days_before,
                now,
            );
            print_json(&json!({ "id": id }))
        }
        Command::Pending(args) => print_json(&scheduler.get_pending(&args.owner, now)),
        Command::List(args) => print_json(&scheduler.notifications_for(&args.owner)),
        Command::Ack(args) => {
            let changed = scheduler.acknowledge(&args.id);
            print_json(&json!({ "id": args.id, "changed": changed }))
        }
        Command::State(args) => {
            let state = scheduler.state_of(&args.id, now);
            print_json(&json!({ "id": args.id, "state": state }))
        }
        Command::AckAll(args) => {
            let changed = scheduler.acknowledge_all(&args.owner, now);
            print_json(&json!({ "acknowledged": changed }))
        }
        Command::Sweep => {
            let removed = scheduler.sweep_expired(now);
            print_json(&json!({ "removed": removed }))
        }
        Command::Settings { command } => match command {
            SettingsCommand::Show => print_json(&scheduler.settings()),
            SettingsCommand::Set(args) => {
                let mut settings = scheduler.settings();
                SettingsPatch {
                    enabled: args.enabled,
                    revalidation_reminders: args.revalidation_reminders,
                    weekly_progress: args.weekly_progress,
                    deadline_alerts: args.deadline_alerts,
                    browser_notifications: args.browser_notifications,
                }
                .apply(&mut settings);
                scheduler.update_settings(settings);
                print_json(&settings)
            }
        },
        Command::Watch(args) => watch(scheduler, config, &args.owner, args.interval_secs).await,
    }
}

/// Polls the store on an interval and shows each newly due reminder once per
/// session. Runs until Ctrl-C.
async fn watch(
    scheduler: &mut ReminderScheduler,
    config: &AppConfig,
    owner: &str,
    interval_secs: u64,
) -> Result<()> {
    if interval_secs == 0 {
        bail!("--interval-secs must be greater than zero");
    }

    let notifier = config.notifier();
    let heartbeat_every = config.heartbeat_every_ticks();
    let mut announced: HashSet<String> = HashSet::new();
    let mut ticker = time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u32 = 0;

    info!("Watching reminders for {owner} every {interval_secs}s");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pending = watch_tick(scheduler, notifier.as_ref(), &mut announced, owner, Utc::now());

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    info!("{pending} pending reminder(s) for {owner}");
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!("failed to listen for Ctrl-C: {err}");
                }
                info!("Watch stopped");
                return Ok(());
            }
        }
    }
}

/// One `watch` pass. Other commands run as separate processes, so the store
/// is re-read first. Returns the number of pending reminders.
fn watch_tick(
    scheduler: &mut ReminderScheduler,
    notifier: &dyn Notifier,
    announced: &mut HashSet<String>,
    owner: &str,
    now: DateTime<Utc>,
) -> usize {
    scheduler.reload();
    let pending = scheduler.get_pending(owner, now);

    if scheduler.permission().is_granted() && scheduler.settings().platform_delivery() {
        for reminder in pending.iter().filter(|r| !announced.contains(&r.id)) {
            notifier.show(&PlatformNotification::from(reminder));
        }
    }
    announced.extend(pending.iter().map(|r| r.id.clone()));

    pending.len()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        reminders::Permission,
        settings::NotificationSettings,
        storage::{MemoryStorage, DEFAULT_STORAGE_KEY},
    };
    use chrono::TimeZone;

    struct RecordingNotifier {
        permission: Permission,
        shown: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new(permission: Permission) -> Arc<Self> {
            Arc::new(Self {
                permission,
                shown: Mutex::new(Vec::new()),
            })
        }

        fn shown(&self) -> Vec<String> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn request_permission(&self) -> Permission {
            self.permission
        }

        fn show(&self, notification: &PlatformNotification) {
            self.shown.lock().unwrap().push(notification.tag.clone());
        }
    }

    fn watcher(
        storage: &MemoryStorage,
        permission: Permission,
        browser_notifications: bool,
    ) -> (ReminderScheduler, Arc<RecordingNotifier>) {
        let notifier = RecordingNotifier::new(permission);
        let mut scheduler =
            ReminderScheduler::new(Box::new(storage.clone()), notifier.clone(), DEFAULT_STORAGE_KEY);
        scheduler.update_settings(NotificationSettings {
            browser_notifications,
            ..NotificationSettings::default()
        });
        (scheduler, notifier)
    }

    fn due_reminder(owner: &str, due_at: DateTime<Utc>) -> NewReminder {
        NewReminder {
            title: "Reflective account".into(),
            message: "Write up this month's reflection".into(),
            category: ReminderCategory::Reflection,
            due_at,
            owner_id: owner.into(),
            priority: ReminderPriority::Medium,
        }
    }

    #[test]
    fn parses_dates_and_instants() {
        assert_eq!(
            parse_instant("2025-03-31").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2025-03-31T10:15:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 31, 9, 15, 0).unwrap()
        );
        assert!(parse_instant("31/03/2025").is_err());
    }

    #[test]
    fn parses_command_line() {
        let cli = Cli::try_parse_from([
            "reminders",
            "--backend",
            "sqlite",
            "schedule",
            "--owner",
            "nurse-1",
            "--title",
            "Reflection",
            "--message",
            "Write a reflective account",
            "--category",
            "reflection",
            "--due",
            "2025-04-01",
            "--priority",
            "high",
        ])
        .unwrap();

        assert_eq!(cli.config.backend, crate::config::StorageBackend::Sqlite);
        match cli.command {
            Command::Schedule(args) => {
                assert_eq!(args.owner, "nurse-1");
                assert!(matches!(args.priority, PriorityArg::High));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn watch_shows_each_due_reminder_once() {
        let storage = MemoryStorage::new();
        let (mut scheduler, notifier) = watcher(&storage, Permission::Granted, true);
        let now = Utc::now();
        let first = scheduler.schedule(due_reminder("nurse-1", now - chrono::Duration::hours(1)));
        scheduler.schedule(due_reminder("nurse-2", now - chrono::Duration::hours(1)));
        let mut announced = HashSet::new();

        assert_eq!(watch_tick(&mut scheduler, notifier.as_ref(), &mut announced, "nurse-1", now), 1);
        assert_eq!(watch_tick(&mut scheduler, notifier.as_ref(), &mut announced, "nurse-1", now), 1);
        assert_eq!(notifier.shown(), vec![first.clone()]);

        let second = scheduler.schedule(due_reminder("nurse-1", now - chrono::Duration::minutes(5)));
        assert_eq!(watch_tick(&mut scheduler, notifier.as_ref(), &mut announced, "nurse-1", now), 2);
        assert_eq!(notifier.shown(), vec![first, second]);
    }

    #[test]
    fn watch_shows_nothing_without_permission_or_delivery_setting() {
        let now = Utc::now();
        for (permission, browser_notifications) in
            [(Permission::Denied, true), (Permission::Granted, false)]
        {
            let storage = MemoryStorage::new();
            let (mut scheduler, notifier) = watcher(&storage, permission, browser_notifications);
            scheduler.schedule(due_reminder("nurse-1", now - chrono::Duration::hours(1)));
            let mut announced = HashSet::new();

            let pending = watch_tick(&mut scheduler, notifier.as_ref(), &mut announced, "nurse-1", now);
            assert_eq!(pending, 1);
            assert!(notifier.shown().is_empty());
        }
    }

    #[test]
    fn watch_sees_reminders_written_by_another_process() {
        let storage = MemoryStorage::new();
        let (mut scheduler, notifier) = watcher(&storage, Permission::Granted, true);
        let mut announced = HashSet::new();
        let now = Utc::now();
        assert_eq!(watch_tick(&mut scheduler, notifier.as_ref(), &mut announced, "nurse-1", now), 0);

        // A separate `schedule` invocation sharing the same store.
        let mut other = ReminderScheduler::new(
            Box::new(storage.clone()),
            RecordingNotifier::new(Permission::Denied),
            DEFAULT_STORAGE_KEY,
        );
        let id = other.schedule(due_reminder("nurse-1", now - chrono::Duration::minutes(1)));
        drop(other);

        assert_eq!(watch_tick(&mut scheduler, notifier.as_ref(), &mut announced, "nurse-1", now), 1);
        assert_eq!(notifier.shown(), vec![id]);
    }

    #[test]
    fn parses_state_command() {
        let cli = Cli::try_parse_from(["reminders", "state", "--id", "reminder_1"]).unwrap();
        assert!(matches!(cli.command, Command::State(IdArgs { ref id }) if id == "reminder_1"));
    }

    #[test]
    fn settings_set_accepts_partial_flags() {
        let cli = Cli::try_parse_from([
            "reminders",
            "settings",
            "set",
            "--browser-notifications",
            "true",
        ])
        .unwrap();
        match cli.command {
            Command::Settings {
                command: SettingsCommand::Set(args),
            } => {
                assert_eq!(args.browser_notifications, Some(true));
                assert_eq!(args.enabled, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
