use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    settings::NotificationSettings,
    storage::{PersistedState, ReminderStorage},
};

use super::{
    calendar::{ReminderOffset, REVALIDATION_SERIES},
    delivery::{DeliveryTimers, Notifier, Permission},
    model::{NewReminder, ReminderCategory, ReminderPriority, ReminderState, ScheduledReminder},
};

// Set to false to silence persistence and delivery diagnostics from this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Read reminders older than this are evicted by `sweep_expired`.
pub const RETENTION_DAYS: i64 = 30;
pub const WEEKLY_PROGRESS_DAYS: i64 = 7;
/// Deadline alerts this close to the deadline are raised as high priority.
const URGENT_DEADLINE_DAYS: u32 = 7;

/// Owns the reminder store. Every mutation runs to completion and then
/// writes the whole store back to storage; a failed write is logged and the
/// in-memory copy stays authoritative for the rest of the session.
pub struct ReminderScheduler {
    storage: Box<dyn ReminderStorage>,
    storage_key: String,
    state: PersistedState,
    timers: DeliveryTimers,
    permission: Permission,
}

impl ReminderScheduler {
    /// Loads the persisted store (a missing or unreadable blob yields an
    /// empty one) and requests notification permission once.
    pub fn new(
        storage: Box<dyn ReminderStorage>,
        notifier: Arc<dyn Notifier>,
        storage_key: impl Into<String>,
    ) -> Self {
        let storage_key = storage_key.into();
        let state = load_state(storage.as_ref(), &storage_key);

        let permission = notifier.request_permission();
        if !permission.is_granted() {
            log_info!("notification permission {:?}; reminders stay in-app only", permission);
        }

        log_info!(
            "reminder store loaded with {} reminder(s) from '{}'",
            state.notifications.len(),
            storage_key
        );

        Self {
            storage,
            storage_key,
            state,
            timers: DeliveryTimers::new(notifier),
            permission,
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn settings(&self) -> NotificationSettings {
        self.state.settings
    }

    /// Replaces the settings. Already scheduled reminders are left alone.
    pub fn update_settings(&mut self, settings: NotificationSettings) {
        self.state.settings = settings;
        self.persist();
    }

    pub fn snapshot(&self) -> &PersistedState {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&ScheduledReminder> {
        self.state.notifications.iter().find(|r| r.id == id)
    }

    /// Replaces the in-memory store with what storage holds now, picking up
    /// writes made by other processes. On a failed or unreadable load the
    /// current copy is kept.
    pub fn reload(&mut self) {
        match read_state(self.storage.as_ref(), &self.storage_key) {
            Ok(state) => self.state = state,
            Err(err) => {
                log_warn!(
                    "keeping in-memory reminders; reload of '{}' failed: {err:#}",
                    self.storage_key
                );
            }
        }
    }

    pub fn armed_deliveries(&self) -> usize {
        self.timers.armed_count()
    }

    /// Stores a reminder and returns its id. A due time in the past is
    /// accepted and makes the reminder pending immediately.
    pub fn schedule(&mut self, input: NewReminder) -> String {
        self.insert(input, Utc::now())
    }

    /// Creates the revalidation series for `expiry`: 6 months, 3 months,
    /// 60 days and 1 month before. Offsets whose due time is not strictly
    /// after `now` are skipped. Returns the ids that were created.
    pub fn schedule_revalidation_series(
        &mut self,
        expiry: DateTime<Utc>,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        if !self.state.settings.allows(ReminderCategory::Revalidation) {
            log_info!("revalidation reminders disabled; skipping series for {}", owner_id);
            return Vec::new();
        }

        let expiry_label = expiry.format("%-d %B %Y").to_string();
        let mut created = Vec::new();

        for step in REVALIDATION_SERIES {
            let Some(due_at) = step.offset.before(expiry) else {
                log_warn!("offset {} before {} is out of range", step.offset.label(), expiry);
                continue;
            };
            if due_at <= now {
                continue;
            }

            let input = NewReminder {
                title: "NMC revalidation reminder".to_string(),
                message: format!(
                    "Your NMC registration expires in {} on {}. Check your practice hours, CPD, \
                     feedback and reflective accounts are complete.",
                    step.offset.label(),
                    expiry_label
                ),
                category: ReminderCategory::Revalidation,
                due_at,
                owner_id: owner_id.to_string(),
                priority: step.priority,
            };
            created.push(self.insert(input, now));
        }

        log_info!(
            "scheduled {} revalidation reminder(s) for {} ahead of {}",
            created.len(),
            owner_id,
            expiry_label
        );
        created
    }

    /// One progress check-in a week after `now`.
    pub fn schedule_weekly_progress(&mut self, owner_id: &str, now: DateTime<Utc>) -> Option<String> {
        if !self.state.settings.allows(ReminderCategory::Progress) {
            return None;
        }

        let input = NewReminder {
            title: "Weekly progress check".to_string(),
            message: "Take a few minutes to log this week's practice hours, CPD and reflections."
                .to_string(),
            category: ReminderCategory::Progress,
            due_at: now + Duration::days(WEEKLY_PROGRESS_DAYS),
            owner_id: owner_id.to_string(),
            priority: ReminderPriority::Low,
        };
        Some(self.insert(input, now))
    }

    /// An alert `days_before` days ahead of `deadline`, skipped when that
    /// moment has already passed.
    pub fn schedule_deadline_alert(
        &mut self,
        owner_id: &str,
        title: &str,
        deadline: DateTime<Utc>,
        days_before: u32,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if !self.state.settings.allows(ReminderCategory::Deadline) {
            return None;
        }

        let offset = ReminderOffset::Days(i64::from(days_before));
        let due_at = offset.before(deadline)?;
        if due_at <= now {
            return None;
        }

        let priority = if days_before <= URGENT_DEADLINE_DAYS {
            ReminderPriority::High
        } else {
            ReminderPriority::Medium
        };

        let input = NewReminder {
            title: format!("Deadline approaching: {title}"),
            message: format!(
                "{title} is due on {} ({} away).",
                deadline.format("%-d %B %Y"),
                offset.label()
            ),
            category: ReminderCategory::Deadline,
            due_at,
            owner_id: owner_id.to_string(),
            priority,
        };
        Some(self.insert(input, now))
    }

    /// Due, unread reminders of `owner_id`: highest priority first, then
    /// earliest due.
    pub fn get_pending(&self, owner_id: &str, now: DateTime<Utc>) -> Vec<ScheduledReminder> {
        let mut pending: Vec<ScheduledReminder> = self
            .state
            .notifications
            .iter()
            .filter(|r| r.owner_id == owner_id && r.is_pending(now))
            .cloned()
            .collect();

        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.due_at.cmp(&b.due_at))
        });
        pending
    }

    pub fn unread_count(&self, owner_id: &str, now: DateTime<Utc>) -> usize {
        self.state
            .notifications
            .iter()
            .filter(|r| r.owner_id == owner_id && r.is_pending(now))
            .count()
    }

    /// Everything stored for `owner_id`, latest due first.
    pub fn notifications_for(&self, owner_id: &str) -> Vec<ScheduledReminder> {
        let mut all: Vec<ScheduledReminder> = self
            .state
            .notifications
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.due_at.cmp(&a.due_at));
        all
    }

    pub fn state_of(&self, id: &str, now: DateTime<Utc>) -> Option<ReminderState> {
        self.get(id).map(|r| r.state(now))
    }

    /// Marks a reminder read. Unknown ids and already-read reminders are a
    /// no-op. Returns whether anything changed.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        let Some(reminder) = self
            .state
            .notifications
            .iter_mut()
            .find(|r| r.id == id && !r.is_read)
        else {
            return false;
        };

        reminder.is_read = true;
        self.timers.cancel(id);
        self.persist();
        true
    }

    /// Acknowledges every pending reminder of `owner_id`.
    pub fn acknowledge_all(&mut self, owner_id: &str, now: DateTime<Utc>) -> usize {
        let mut changed = Vec::new();
        for reminder in self
            .state
            .notifications
            .iter_mut()
            .filter(|r| r.owner_id == owner_id && r.is_pending(now))
        {
            reminder.is_read = true;
            changed.push(reminder.id.clone());
        }

        if changed.is_empty() {
            return 0;
        }
        for id in &changed {
            self.timers.cancel(id);
        }
        self.persist();
        changed.len()
    }

    /// Evicts read reminders that fell due more than `RETENTION_DAYS` ago.
    /// Unread reminders are kept regardless of age. Returns the number removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let retention = Duration::days(RETENTION_DAYS);
        let before = self.state.notifications.len();
        self.state
            .notifications
            .retain(|r| !(r.is_read && now - r.due_at > retention));
        let removed = before - self.state.notifications.len();

        if removed > 0 {
            log_info!("swept {} expired reminder(s)", removed);
            self.persist();
        }
        removed
    }

    fn insert(&mut self, input: NewReminder, now: DateTime<Utc>) -> String {
        let id = self.next_id(now);
        let reminder = input.into_scheduled(id.clone());

        if self.state.settings.platform_delivery() && self.permission.is_granted() {
            self.timers.arm(&reminder, now);
        }
        log_info!(
            "scheduled {} reminder {} ({} priority) due {}",
            reminder.category,
            reminder.id,
            reminder.priority,
            reminder.due_at.to_rfc3339()
        );

        self.state.notifications.push(reminder);
        self.persist();
        id
    }

    /// Millisecond timestamp plus a random suffix, re-rolled on the rare
    /// collision with an id already in the store.
    fn next_id(&self, now: DateTime<Utc>) -> String {
        loop {
            let suffix = Uuid::new_v4().simple().to_string();
            let id = format!("reminder_{}_{}", now.timestamp_millis(), &suffix[..9]);
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn persist(&self) {
        let result = self
            .state
            .encode()
            .and_then(|blob| self.storage.save(&self.storage_key, &blob));
        if let Err(err) = result {
            log_error!("failed to persist reminders to '{}': {err:#}", self.storage_key);
        }
    }
}

fn read_state(storage: &dyn ReminderStorage, key: &str) -> Result<PersistedState> {
    match storage.load(key)? {
        Some(blob) => PersistedState::decode(&blob),
        None => Ok(PersistedState::default()),
    }
}

fn load_state(storage: &dyn ReminderStorage, key: &str) -> PersistedState {
    read_state(storage, key).unwrap_or_else(|err| {
        log_error!("discarding unreadable reminder store '{}': {err:#}", key);
        PersistedState::default()
    })
}
