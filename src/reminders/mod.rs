pub mod calendar;
pub mod delivery;
pub mod model;
pub mod scheduler;

pub use calendar::{ReminderOffset, REVALIDATION_SERIES};
pub use delivery::{
    DeliveryTimers, DisabledNotifier, LogNotifier, Notifier, Permission, PlatformNotification,
};
pub use model::{NewReminder, ReminderCategory, ReminderPriority, ReminderState, ScheduledReminder};
pub use scheduler::{ReminderScheduler, RETENTION_DAYS, WEEKLY_PROGRESS_DAYS};
