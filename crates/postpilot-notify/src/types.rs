use chrono::{DateTime, Utc};
use postpilot_core::{push::NotificationView, Platform, PostKind, UserId};
use serde::{Deserialize, Serialize};

/// What a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Reminder ahead of a scheduled post.
    PrePosting,
    /// Scheduled post was published.
    Success,
    /// Scheduled post could not be published.
    Failure,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationKind::PrePosting => "pre_posting",
            NotificationKind::Success => "success",
            NotificationKind::Failure => "failure",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pre_posting" => Ok(NotificationKind::PrePosting),
            "success" => Ok(NotificationKind::Success),
            "failure" => Ok(NotificationKind::Failure),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// A persisted notification record. Only `is_read` ever changes after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// UUID v4 string, primary key.
    pub id: String,
    pub user_id: UserId,
    pub post_id: Option<i64>,
    pub kind: NotificationKind,
    pub platform: Platform,
    pub strategy_name: Option<String>,
    pub message: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Dashboard-facing shape used in push frames and the HTTP list.
    pub fn view(&self) -> NotificationView {
        NotificationView {
            id: self.id.clone(),
            kind: self.kind.to_string(),
            platform: self.platform,
            strategy_name: self.strategy_name.clone(),
            message: self.message.clone(),
            timestamp: self.created_at,
            is_read: self.is_read,
            post_id: self.post_id.map(|id| id.to_string()),
            scheduled_time: self.scheduled_time,
            error: self.error_message.clone(),
        }
    }
}

/// Insert request for [`crate::store::NotificationStore::create`].
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub post_id: Option<i64>,
    pub kind: NotificationKind,
    pub platform: Platform,
    pub strategy_name: Option<String>,
    pub message: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Per-user delivery toggles. `failure_enabled` is always true once stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub browser_notifications_enabled: bool,
    pub pre_posting_enabled: bool,
    pub success_enabled: bool,
    pub failure_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            browser_notifications_enabled: true,
            pre_posting_enabled: true,
            success_enabled: true,
            failure_enabled: true,
        }
    }
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub browser_notifications_enabled: Option<bool>,
    pub pre_posting_enabled: Option<bool>,
    pub success_enabled: Option<bool>,
    /// Accepted for wire compatibility; the stored value is forced back to true.
    pub failure_enabled: Option<bool>,
}

impl NotificationPreferences {
    /// Apply a partial update. Failures cannot be silenced.
    pub fn apply(mut self, update: &PreferencesUpdate) -> Self {
        if let Some(v) = update.browser_notifications_enabled {
            self.browser_notifications_enabled = v;
        }
        if let Some(v) = update.pre_posting_enabled {
            self.pre_posting_enabled = v;
        }
        if let Some(v) = update.success_enabled {
            self.success_enabled = v;
        }
        self.failure_enabled = true;
        self
    }
}

/// The post a notification is about, as the notifier needs to describe it.
#[derive(Debug, Clone)]
pub struct PostContext {
    pub post_id: i64,
    pub user_id: UserId,
    pub platform: Platform,
    pub kind: PostKind,
    pub caption: String,
    pub strategy_name: String,
    pub scheduled_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_cannot_be_disabled() {
        let update = PreferencesUpdate {
            success_enabled: Some(false),
            failure_enabled: Some(false),
            ..Default::default()
        };
        let prefs = NotificationPreferences::default().apply(&update);
        assert!(!prefs.success_enabled);
        assert!(prefs.pre_posting_enabled);
        assert!(prefs.failure_enabled);
    }

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [
            NotificationKind::PrePosting,
            NotificationKind::Success,
            NotificationKind::Failure,
        ] {
            assert_eq!(kind.to_string().parse::<NotificationKind>(), Ok(kind));
        }
    }
}
