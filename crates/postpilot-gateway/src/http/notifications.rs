//! Notification query surface for the dashboard.
//!
//! Every route requires `Authorization: Bearer <jwt>` and only ever touches
//! the caller's own records.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use postpilot_core::push::NotificationView;
use postpilot_notify::{NotificationPreferences, PreferencesUpdate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::ApiError;
use crate::app::AppState;
use crate::auth::AuthUser;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub notifications: Vec<NotificationView>,
    pub unread_count: u64,
}

/// GET /api/notifications?limit=50&offset=0: newest first.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let notifications = state
        .notifications
        .list(user_id, limit, offset)?
        .iter()
        .map(|n| n.view())
        .collect();
    let unread_count = state.notifications.unread_count(user_id)?;
    Ok(Json(ListResponse {
        notifications,
        unread_count,
    }))
}

/// POST /api/notifications/{id}/mark-read: 404 when unknown or not the caller's.
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.notifications.mark_read(&id, user_id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/notifications/mark-all-read
pub async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let updated = state.notifications.mark_all_read(user_id)?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

/// GET /api/notification-preferences
pub async fn get_preferences_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<NotificationPreferences>, ApiError> {
    Ok(Json(state.notifications.preferences(user_id)?))
}

/// PUT /api/notification-preferences: partial update; failures stay enabled.
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<NotificationPreferences>, ApiError> {
    Ok(Json(
        state.notifications.update_preferences(user_id, &update)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use crate::auth::issue_token;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use postpilot_core::config::PostpilotConfig;
    use postpilot_core::Platform;
    use postpilot_notify::{
        ConnectionRegistry, NewNotification, NotificationKind, NotificationStore,
    };
    use rusqlite::Connection;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn state() -> Arc<AppState> {
        let mut config = PostpilotConfig::default();
        config.auth.jwt_secret = SECRET.to_string();
        Arc::new(AppState::new(
            config,
            Arc::new(NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap()),
            Arc::new(ConnectionRegistry::new()),
        ))
    }

    fn seed(state: &AppState, user_id: i64, message: &str) -> String {
        state
            .notifications
            .create(NewNotification {
                user_id,
                post_id: Some(1),
                kind: NotificationKind::Success,
                platform: Platform::Instagram,
                strategy_name: None,
                message: message.to_string(),
                scheduled_time: None,
                error_message: None,
            })
            .unwrap()
            .id
    }

    fn request(method: &str, uri: &str, user_id: i64, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", issue_token(SECRET, user_id)));
        match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_requires_a_token() {
        let app = build_router(state());
        let resp = app
            .oneshot(Request::get("/api/notifications").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"]["code"], "AUTH_FAILED");
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_caller() {
        let state = state();
        seed(&state, 1, "mine");
        seed(&state, 2, "theirs");
        let app = build_router(Arc::clone(&state));

        let resp = app
            .oneshot(request("GET", "/api/notifications?limit=10", 1, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["notifications"].as_array().unwrap().len(), 1);
        assert_eq!(body["notifications"][0]["message"], "mine");
        assert_eq!(body["notifications"][0]["isRead"], false);
        assert_eq!(body["unread_count"], 1);
    }

    #[tokio::test]
    async fn mark_read_of_foreign_notification_is_404() {
        let state = state();
        let theirs = seed(&state, 2, "theirs");
        let app = build_router(Arc::clone(&state));

        let resp = app
            .oneshot(request(
                "POST",
                &format!("/api/notifications/{theirs}/mark-read"),
                1,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.notifications.unread_count(2).unwrap(), 1);
    }

    #[tokio::test]
    async fn preferences_update_keeps_failures_on() {
        let app = build_router(state());
        let resp = app
            .oneshot(request(
                "PUT",
                "/api/notification-preferences",
                3,
                Some(json!({ "success_enabled": false, "failure_enabled": false })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success_enabled"], false);
        assert_eq!(body["failure_enabled"], true);
        assert_eq!(body["pre_posting_enabled"], true);
    }

    #[tokio::test]
    async fn mark_all_read_reports_count() {
        let state = state();
        seed(&state, 1, "a");
        seed(&state, 1, "b");
        let app = build_router(Arc::clone(&state));

        let resp = app
            .oneshot(request("POST", "/api/notifications/mark-all-read", 1, None))
            .await
            .unwrap();
        assert_eq!(json_body(resp).await["updated"], 2);
        assert_eq!(state.notifications.unread_count(1).unwrap(), 0);
    }
}
