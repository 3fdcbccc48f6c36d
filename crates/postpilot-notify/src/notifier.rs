use std::sync::Arc;

use chrono::Utc;
use postpilot_core::push::{prompt_preview, PostOutcome, PushPayload};
use tracing::{info, warn};

use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::store::NotificationStore;
use crate::types::{NewNotification, Notification, NotificationKind, PostContext};

/// Persists notifications and pushes them to the owner's live channels.
///
/// The single notification path used by both the pre-alert scan and the
/// due-post executor. Preference gating lives here so every caller gets the
/// same rules: pre-posting and success respect the user's toggles, failures
/// are always delivered.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<NotificationStore>,
    registry: Arc<ConnectionRegistry>,
}

impl Notifier {
    pub fn new(store: Arc<NotificationStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Reminder that `post` runs in `minutes_until` minutes.
    ///
    /// Returns `None` when the user turned pre-posting reminders off.
    pub fn pre_posting(&self, post: &PostContext, minutes_until: i64) -> Result<Option<Notification>> {
        let prefs = self.store.preferences(post.user_id)?;
        if !prefs.pre_posting_enabled {
            info!(post_id = post.post_id, user_id = post.user_id, "pre-posting reminders disabled");
            return Ok(None);
        }

        let notification = self.store.create(NewNotification {
            user_id: post.user_id,
            post_id: Some(post.post_id),
            kind: NotificationKind::PrePosting,
            platform: post.platform,
            strategy_name: Some(post.strategy_name.clone()),
            message: format!(
                "Your {} strategy will be posted in {} minutes. If you'd like to change anything before the post is made, now is the time.",
                post.strategy_name, minutes_until
            ),
            scheduled_time: Some(post.scheduled_time),
            error_message: None,
        })?;

        let payload = PushPayload::ScheduledPostReminder {
            post_id: post.post_id,
            scheduled_time: post.scheduled_time,
            minutes_until,
            prompt: prompt_preview(&post.caption),
            post_type: post.kind,
            message: format!(
                "Your scheduled post is set to be published in {minutes_until} minutes. If you need to make any changes, please do so now."
            ),
            notification: notification.view(),
        };
        self.push(&notification, &payload);
        Ok(Some(notification))
    }

    /// Success report for a published post. `None` when success alerts are off.
    pub fn post_succeeded(
        &self,
        post: &PostContext,
        platform_post_id: Option<&str>,
    ) -> Result<Option<Notification>> {
        let prefs = self.store.preferences(post.user_id)?;
        if !prefs.success_enabled {
            info!(post_id = post.post_id, user_id = post.user_id, "success notifications disabled");
            return Ok(None);
        }

        let now = Utc::now();
        let notification = self.store.create(NewNotification {
            user_id: post.user_id,
            post_id: Some(post.post_id),
            kind: NotificationKind::Success,
            platform: post.platform,
            strategy_name: Some(post.strategy_name.clone()),
            message: format!(
                "Your {} post has been successfully published at {} UTC.",
                post.strategy_name,
                now.format("%I:%M %p")
            ),
            scheduled_time: Some(post.scheduled_time),
            error_message: None,
        })?;

        let payload = PushPayload::ScheduledPostStatus {
            post_id: post.post_id,
            status: PostOutcome::Success,
            message: format!(
                "Your scheduled post has been successfully published to {}!",
                post.platform.label()
            ),
            prompt: prompt_preview(&post.caption),
            post_type: post.kind,
            timestamp: now,
            platform_post_id: platform_post_id.map(str::to_string),
            notification: notification.view(),
        };
        self.push(&notification, &payload);
        Ok(Some(notification))
    }

    /// Failure report. Delivered regardless of the user's preferences.
    pub fn post_failed(&self, post: &PostContext, error: &str) -> Result<Notification> {
        let notification = self.store.create(NewNotification {
            user_id: post.user_id,
            post_id: Some(post.post_id),
            kind: NotificationKind::Failure,
            platform: post.platform,
            strategy_name: Some(post.strategy_name.clone()),
            message: format!(
                "Your {} post failed to publish. Reason: {}. Please check your settings and try again.",
                post.strategy_name, error
            ),
            scheduled_time: Some(post.scheduled_time),
            error_message: Some(error.to_string()),
        })?;

        let payload = PushPayload::ScheduledPostStatus {
            post_id: post.post_id,
            status: PostOutcome::Failed,
            message: format!("Failed to publish your scheduled post: {error}"),
            prompt: prompt_preview(&post.caption),
            post_type: post.kind,
            timestamp: Utc::now(),
            platform_post_id: None,
            notification: notification.view(),
        };
        self.push(&notification, &payload);
        Ok(notification)
    }

    /// Send the generic `notification` frame for the stored record, then the
    /// post-specific frame.
    fn push(&self, notification: &Notification, payload: &PushPayload) {
        let user_id = notification.user_id;
        let post_id = notification.post_id.unwrap_or_default();
        let record = PushPayload::Notification {
            notification: notification.view(),
        };
        self.registry.broadcast(user_id, &record.to_json());
        let sent = self.registry.broadcast(user_id, &payload.to_json());
        if sent == 0 {
            warn!(user_id, post_id, "no live channels; notification stored only");
        } else {
            info!(user_id, post_id, connections = sent, "notification pushed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PushChannel;
    use crate::types::PreferencesUpdate;
    use chrono::{TimeZone, Utc};
    use postpilot_core::{Platform, PostKind};
    use rusqlite::Connection;

    fn notifier() -> Notifier {
        let store = NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap();
        Notifier::new(Arc::new(store), Arc::new(ConnectionRegistry::new()))
    }

    fn frame(rx: &mut tokio::sync::mpsc::Receiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    fn ctx() -> PostContext {
        PostContext {
            post_id: 12,
            user_id: 4,
            platform: Platform::Instagram,
            kind: PostKind::Photo,
            caption: "Sunrise over the bay".to_string(),
            strategy_name: "Daily Motivation".to_string(),
            scheduled_time: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn reminder_is_stored_and_pushed() {
        let notifier = notifier();
        let (chan, mut rx) = PushChannel::new(4);
        notifier.registry().register(4, chan);

        let n = notifier.pre_posting(&ctx(), 10).unwrap().expect("enabled by default");
        assert_eq!(n.kind, NotificationKind::PrePosting);
        assert!(n.message.contains("Daily Motivation"));

        let record = frame(&mut rx);
        assert_eq!(record["type"], "notification");
        assert_eq!(record["notification"]["id"], n.id.as_str());
        assert_eq!(record["notification"]["type"], "pre_posting");

        let frame = frame(&mut rx);
        assert_eq!(frame["type"], "scheduled_post_reminder");
        assert_eq!(frame["minutes_until"], 10);
        assert_eq!(frame["notification"]["id"], n.id.as_str());
    }

    #[test]
    fn disabled_reminders_are_neither_stored_nor_pushed() {
        let notifier = notifier();
        let (chan, mut rx) = PushChannel::new(4);
        notifier.registry().register(4, chan);
        notifier
            .store()
            .update_preferences(
                4,
                &PreferencesUpdate {
                    pre_posting_enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(notifier.pre_posting(&ctx(), 9).unwrap().is_none());
        assert!(rx.try_recv().is_err());
        assert!(notifier.store().list(4, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn failures_ignore_preferences() {
        let notifier = notifier();
        notifier
            .store()
            .update_preferences(
                4,
                &PreferencesUpdate {
                    success_enabled: Some(false),
                    failure_enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(notifier.post_succeeded(&ctx(), Some("ig-1")).unwrap().is_none());
        let n = notifier.post_failed(&ctx(), "token expired").unwrap();
        assert_eq!(n.error_message.as_deref(), Some("token expired"));
        assert!(n.message.contains("token expired"));
        assert_eq!(notifier.store().list(4, 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn success_frame_carries_platform_post_id() {
        let notifier = notifier();
        let (chan, mut rx) = PushChannel::new(4);
        notifier.registry().register(4, chan);

        notifier.post_succeeded(&ctx(), Some("1789")).unwrap();
        assert_eq!(frame(&mut rx)["type"], "notification");
        let frame = frame(&mut rx);
        assert_eq!(frame["type"], "scheduled_post_status");
        assert_eq!(frame["status"], "success");
        assert_eq!(frame["platform_post_id"], "1789");
    }

    #[test]
    fn failure_sends_record_then_status() {
        let notifier = notifier();
        let (chan, mut rx) = PushChannel::new(4);
        notifier.registry().register(4, chan);

        let n = notifier.post_failed(&ctx(), "token expired").unwrap();

        let record = frame(&mut rx);
        assert_eq!(record["type"], "notification");
        assert_eq!(record["notification"]["id"], n.id.as_str());
        assert_eq!(record["notification"]["type"], "failure");
        assert_eq!(record["notification"]["error"], "token expired");

        let status = frame(&mut rx);
        assert_eq!(status["type"], "scheduled_post_status");
        assert_eq!(status["status"], "failed");
        assert!(rx.try_recv().is_err());
    }
}
