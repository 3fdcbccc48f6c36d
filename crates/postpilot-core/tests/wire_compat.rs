// Push frames must keep the shape the dashboard's notification client reads.

use postpilot_core::push::{NotificationView, PushPayload};
use postpilot_core::{Platform, PostKind};

const STORED: &str = r#"{
    "id": "5d1c0f9e-1111-4c2b-9a55-2f6f1f0c0a01",
    "type": "failure",
    "platform": "facebook",
    "strategyName": null,
    "message": "Failed to publish your scheduled post: token expired",
    "timestamp": "2026-03-01T08:00:00Z",
    "isRead": true,
    "postId": "12",
    "scheduledTime": "2026-03-01T07:59:00Z",
    "error": "token expired"
}"#;

#[test]
fn dashboard_view_parses() {
    let view: NotificationView = serde_json::from_str(STORED).unwrap();
    assert_eq!(view.kind, "failure");
    assert_eq!(view.platform, Platform::Facebook);
    assert!(view.is_read);
    assert_eq!(view.post_id.as_deref(), Some("12"));
    assert_eq!(view.error.as_deref(), Some("token expired"));
}

#[test]
fn plain_notification_frame() {
    let view: NotificationView = serde_json::from_str(STORED).unwrap();
    let json = PushPayload::Notification { notification: view }.to_json();

    assert!(json.starts_with(r#"{"type":"notification""#));
    assert!(json.contains(r#""scheduledTime":"2026-03-01T07:59:00Z""#));
    // snake_case keys belong to the frame, never the nested view
    assert!(!json.contains("is_read"));
    assert!(!json.contains("strategy_name"));
}

#[test]
fn frame_parses_back_from_client_echo() {
    let json = format!(
        r#"{{"type":"scheduled_post_reminder","post_id":12,"scheduled_time":"2026-03-01T07:59:00Z",
            "minutes_until":9,"prompt":"Spring menu","post_type":"carousel",
            "message":"Your scheduled post is set to be published in 9 minutes.",
            "notification":{STORED}}}"#
    );
    let frame: PushPayload = serde_json::from_str(&json).unwrap();
    match frame {
        PushPayload::ScheduledPostReminder {
            post_id,
            minutes_until,
            post_type,
            ..
        } => {
            assert_eq!(post_id, 12);
            assert_eq!(minutes_until, 9);
            assert_eq!(post_type, PostKind::Carousel);
        }
        other => panic!("expected reminder, got {other:?}"),
    }
}

#[test]
fn unknown_frame_type_is_rejected() {
    let json = r#"{"type":"chat","text":"hi"}"#;
    assert!(serde_json::from_str::<PushPayload>(json).is_err());
}
