use serde::{Deserialize, Serialize};

use crate::reminders::ReminderCategory;

/// User-facing reminder switches, persisted alongside the reminders.
///
/// The switches gate whether the `schedule_*` helpers create reminders at
/// all. Flipping one never touches reminders that were already scheduled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub revalidation_reminders: bool,
    pub weekly_progress: bool,
    pub deadline_alerts: bool,
    pub browser_notifications: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            revalidation_reminders: true,
            weekly_progress: true,
            deadline_alerts: true,
            browser_notifications: false,
        }
    }
}

impl NotificationSettings {
    /// Whether a helper producing `category` reminders should create anything.
    pub fn allows(&self, category: ReminderCategory) -> bool {
        if !self.enabled {
            return false;
        }
        match category {
            ReminderCategory::Revalidation => self.revalidation_reminders,
            ReminderCategory::Progress => self.weekly_progress,
            ReminderCategory::Deadline => self.deadline_alerts,
            ReminderCategory::Cpd | ReminderCategory::Reflection => true,
        }
    }

    pub fn platform_delivery(&self) -> bool {
        self.enabled && self.browser_notifications
    }
}

/// Partial update applied by `settings set`; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsPatch {
    pub enabled: Option<bool>,
    pub revalidation_reminders: Option<bool>,
    pub weekly_progress: Option<bool>,
    pub deadline_alerts: Option<bool>,
    pub browser_notifications: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(&self, settings: &mut NotificationSettings) {
        if let Some(value) = self.enabled {
            settings.enabled = value;
        }
        if let Some(value) = self.revalidation_reminders {
            settings.revalidation_reminders = value;
        }
        if let Some(value) = self.weekly_progress {
            settings.weekly_progress = value;
        }
        if let Some(value) = self.deadline_alerts {
            settings.deadline_alerts = value;
        }
        if let Some(value) = self.browser_notifications {
            settings.browser_notifications = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_switch_gates_every_category() {
        let settings = NotificationSettings {
            enabled: false,
            ..NotificationSettings::default()
        };
        assert!(!settings.allows(ReminderCategory::Revalidation));
        assert!(!settings.allows(ReminderCategory::Cpd));
        assert!(!settings.platform_delivery());
    }

    #[test]
    fn category_switches_are_independent() {
        let settings = NotificationSettings {
            weekly_progress: false,
            ..NotificationSettings::default()
        };
        assert!(settings.allows(ReminderCategory::Revalidation));
        assert!(!settings.allows(ReminderCategory::Progress));
        assert!(settings.allows(ReminderCategory::Deadline));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: NotificationSettings =
            serde_json::from_str(r#"{"browserNotifications":true}"#).unwrap();
        assert!(settings.enabled);
        assert!(settings.browser_notifications);
        assert!(settings.platform_delivery());
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut settings = NotificationSettings::default();
        SettingsPatch {
            deadline_alerts: Some(false),
            ..SettingsPatch::default()
        }
        .apply(&mut settings);
        assert!(!settings.deadline_alerts);
        assert!(settings.revalidation_reminders);
    }
}
