//! Push payloads: the JSON frames written to live notification channels.
//!
//! Built by the notifier in `postpilot-notify`, serialised once, and fanned
//! out to every channel a user holds through the connection registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Platform, PostKind};

/// Captions longer than this are cut in push payloads.
pub const PROMPT_PREVIEW_CHARS: usize = 100;

/// A stored notification as the dashboard sees it (camelCase keys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: Platform,
    pub strategy_name: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub post_id: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Final outcome reported in a `scheduled_post_status` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostOutcome {
    Success,
    Failed,
}

/// Every frame sent over a live channel carries a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushPayload {
    /// One-time heads-up before a scheduled post executes.
    ScheduledPostReminder {
        post_id: i64,
        scheduled_time: DateTime<Utc>,
        minutes_until: i64,
        prompt: String,
        post_type: PostKind,
        message: String,
        notification: NotificationView,
    },
    /// Result of executing a scheduled post.
    ScheduledPostStatus {
        post_id: i64,
        status: PostOutcome,
        message: String,
        prompt: String,
        post_type: PostKind,
        timestamp: DateTime<Utc>,
        platform_post_id: Option<String>,
        notification: NotificationView,
    },
    /// Any other stored notification.
    Notification { notification: NotificationView },
}

impl PushPayload {
    pub fn to_json(&self) -> String {
        // Every field is a plain string, number, or timestamp; this cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Shorten a caption for a push frame, appending `...` when cut.
pub fn prompt_preview(caption: &str) -> String {
    if caption.chars().count() > PROMPT_PREVIEW_CHARS {
        let head: String = caption.chars().take(PROMPT_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        caption.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> NotificationView {
        NotificationView {
            id: "n-1".to_string(),
            kind: "pre_posting".to_string(),
            platform: Platform::Instagram,
            strategy_name: Some("Daily Motivation".to_string()),
            message: "soon".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            is_read: false,
            post_id: Some("7".to_string()),
            scheduled_time: None,
            error: None,
        }
    }

    #[test]
    fn reminder_frame_is_type_tagged() {
        let payload = PushPayload::ScheduledPostReminder {
            post_id: 7,
            scheduled_time: view().timestamp,
            minutes_until: 10,
            prompt: "hello".to_string(),
            post_type: PostKind::Photo,
            message: "Your scheduled post is set to be published in 10 minutes.".to_string(),
            notification: view(),
        };
        let json: serde_json::Value = serde_json::from_str(&payload.to_json()).unwrap();
        assert_eq!(json["type"], "scheduled_post_reminder");
        assert_eq!(json["post_id"], 7);
        assert_eq!(json["post_type"], "photo");
        assert_eq!(json["notification"]["type"], "pre_posting");
        assert_eq!(json["notification"]["strategyName"], "Daily Motivation");
        assert_eq!(json["notification"]["isRead"], false);
    }

    #[test]
    fn status_frame_carries_outcome() {
        let payload = PushPayload::ScheduledPostStatus {
            post_id: 3,
            status: PostOutcome::Failed,
            message: "boom".to_string(),
            prompt: "p".to_string(),
            post_type: PostKind::Reel,
            timestamp: view().timestamp,
            platform_post_id: None,
            notification: view(),
        };
        let json: serde_json::Value = serde_json::from_str(&payload.to_json()).unwrap();
        assert_eq!(json["type"], "scheduled_post_status");
        assert_eq!(json["status"], "failed");
        assert!(json["platform_post_id"].is_null());
    }

    #[test]
    fn long_captions_are_cut_at_100_chars() {
        let caption = "é".repeat(150);
        let preview = prompt_preview(&caption);
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
        assert_eq!(prompt_preview("short"), "short");
    }
}
