use std::{fs, sync::Arc};

use chrono::{DateTime, Duration, TimeZone, Utc};
use revalidation_reminders_lib::{
    reminders::DisabledNotifier,
    storage::{PersistedState, DEFAULT_STORAGE_KEY},
    JsonFileStorage, NewReminder, NotificationSettings, ReminderCategory, ReminderPriority,
    ReminderScheduler, ReminderStorage, SqliteStorage,
};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn open(storage: Box<dyn ReminderStorage>) -> ReminderScheduler {
    ReminderScheduler::new(storage, Arc::new(DisabledNotifier), DEFAULT_STORAGE_KEY)
}

fn populate(scheduler: &mut ReminderScheduler) -> String {
    scheduler.schedule_revalidation_series(at(2025, 3, 31), "nurse-1", at(2024, 6, 1));
    let reflection = scheduler.schedule(NewReminder {
        title: "Reflective account".into(),
        message: "Write up last week's incident review".into(),
        category: ReminderCategory::Reflection,
        due_at: at(2024, 7, 1),
        owner_id: "nurse-1".into(),
        priority: ReminderPriority::High,
    });
    scheduler.acknowledge(&reflection);
    scheduler.update_settings(NotificationSettings {
        weekly_progress: false,
        ..NotificationSettings::default()
    });
    reflection
}

#[test]
fn json_backend_round_trips_the_store() {
    let dir = tempfile::tempdir().unwrap();

    let expected = {
        let mut scheduler = open(Box::new(JsonFileStorage::new(dir.path().into()).unwrap()));
        populate(&mut scheduler);
        scheduler.snapshot().clone()
    };

    let reloaded = open(Box::new(JsonFileStorage::new(dir.path().into()).unwrap()));
    assert_eq!(reloaded.snapshot(), &expected);
    assert!(!reloaded.settings().weekly_progress);

    let raw = fs::read_to_string(dir.path().join(format!("{DEFAULT_STORAGE_KEY}.json"))).unwrap();
    assert!(raw.contains("\"dueAt\":\"2024-12-31T00:00:00Z\""));
    assert!(raw.contains("\"settings\""));
}

#[test]
fn sqlite_backend_round_trips_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reminders.sqlite3");

    let (expected, acknowledged) = {
        let mut scheduler = open(Box::new(SqliteStorage::new(path.clone()).unwrap()));
        let id = populate(&mut scheduler);
        (scheduler.snapshot().clone(), id)
    };

    let reloaded = open(Box::new(SqliteStorage::new(path).unwrap()));
    assert_eq!(reloaded.snapshot(), &expected);
    assert!(reloaded.get(&acknowledged).unwrap().is_read);
}

#[test]
fn corrupted_file_is_replaced_on_next_write() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join(format!("{DEFAULT_STORAGE_KEY}.json"));
    fs::write(&file, "\u{0}\u{1}not json").unwrap();

    let mut scheduler = open(Box::new(JsonFileStorage::new(dir.path().into()).unwrap()));
    assert!(scheduler.snapshot().notifications.is_empty());

    let now = Utc::now();
    scheduler.schedule(NewReminder {
        title: "Practice hours".into(),
        message: "Log this month's hours".into(),
        category: ReminderCategory::Progress,
        due_at: now - Duration::minutes(1),
        owner_id: "nurse-1".into(),
        priority: ReminderPriority::Medium,
    });

    let state = PersistedState::decode(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(state.notifications.len(), 1);
    assert_eq!(scheduler.get_pending("nurse-1", Utc::now()).len(), 1);
}

#[test]
fn sweep_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path().into()).unwrap();
    let mut scheduler = open(Box::new(storage));

    let old = scheduler.schedule(NewReminder {
        title: "CPD".into(),
        message: "Old CPD nudge".into(),
        category: ReminderCategory::Cpd,
        due_at: at(2024, 1, 1),
        owner_id: "nurse-1".into(),
        priority: ReminderPriority::Low,
    });
    scheduler.acknowledge(&old);
    assert_eq!(scheduler.sweep_expired(at(2024, 6, 1)), 1);

    let reloaded = open(Box::new(JsonFileStorage::new(dir.path().into()).unwrap()));
    assert!(reloaded.snapshot().notifications.is_empty());
}
