//! Best-effort platform delivery.
//!
//! Each armed reminder gets an in-memory tokio task that sleeps until the
//! due time and then asks the [`Notifier`] to display it. Timers are not
//! durable: anything armed in this process is gone once the process exits,
//! and nothing re-arms them on the next start. The reminder store stays the
//! source of truth; callers find due reminders through
//! `ReminderScheduler::get_pending` whether or not a timer ever fired.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::model::{ReminderPriority, ScheduledReminder};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    Granted,
    Denied,
    Unsupported,
}

impl Permission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Permission::Granted)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
    /// The reminder id, so the surface can collapse duplicates.
    pub tag: String,
    pub require_interaction: bool,
}

impl From<&ScheduledReminder> for PlatformNotification {
    fn from(reminder: &ScheduledReminder) -> Self {
        Self {
            title: reminder.title.clone(),
            body: reminder.message.clone(),
            tag: reminder.id.clone(),
            require_interaction: reminder.priority == ReminderPriority::High,
        }
    }
}

/// Platform notification surface (desktop notifications, a service worker, ...).
pub trait Notifier: Send + Sync {
    /// Called once when the scheduler starts.
    fn request_permission(&self) -> Permission;
    fn show(&self, notification: &PlatformNotification);
}

/// Writes notifications to the log. Always granted.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, notification: &PlatformNotification) {
        let marker = if notification.require_interaction {
            " [action needed]"
        } else {
            ""
        };
        log::info!(
            "reminder {}{}: {} ({})",
            notification.title,
            marker,
            notification.body,
            notification.tag
        );
    }
}

/// A host without a notification surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Unsupported
    }

    fn show(&self, _notification: &PlatformNotification) {}
}

type ArmedTimers = Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>;

/// In-memory delivery timers keyed by reminder id.
pub struct DeliveryTimers {
    notifier: Arc<dyn Notifier>,
    armed: ArmedTimers,
    generation: AtomicU64,
}

impl DeliveryTimers {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            armed: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Arms a timer for `reminder`. Returns false when nothing was armed:
    /// the due time is not in the future, or there is no tokio runtime to
    /// host the timer.
    pub fn arm(&self, reminder: &ScheduledReminder, now: DateTime<Utc>) -> bool {
        let delay = match (reminder.due_at - now).to_std() {
            Ok(delay) if !delay.is_zero() => delay,
            _ => return false,
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log_warn!(
                    "no async runtime; reminder {} will only surface through pending queries",
                    reminder.id
                );
                return false;
            }
        };

        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let id = reminder.id.clone();
        let notification = PlatformNotification::from(reminder);
        let notifier = Arc::clone(&self.notifier);
        let armed = Arc::clone(&self.armed);
        let task_token = token.clone();

        if let Ok(mut guard) = self.armed.lock() {
            if let Some((_, previous)) = guard.insert(id.clone(), (generation, token)) {
                previous.cancel();
            }
        }

        runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    notifier.show(&notification);
                    log_info!("delivered reminder {}", id);
                }
                _ = task_token.cancelled() => {
                    log_info!("delivery for reminder {} cancelled", id);
                }
            }
            if let Ok(mut guard) = armed.lock() {
                // A later arm for the same id owns the slot now.
                if guard.get(&id).is_some_and(|(current, _)| *current == generation) {
                    guard.remove(&id);
                }
            }
        });

        true
    }

    pub fn cancel(&self, id: &str) -> bool {
        let token = match self.armed.lock() {
            Ok(mut guard) => guard.remove(id),
            Err(_) => None,
        };
        match token {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl Drop for DeliveryTimers {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.armed.lock() {
            for (_, (_, token)) in guard.drain() {
                token.cancel();
            }
        }
    }
}
