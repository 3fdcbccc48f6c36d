use axum::{
    routing::{get, post},
    Router,
};
use postpilot_core::config::PostpilotConfig;
use postpilot_notify::{ConnectionRegistry, NotificationStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::TokenVerifier;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: PostpilotConfig,
    pub tokens: TokenVerifier,
    pub notifications: Arc<NotificationStore>,
    /// Live push channels, shared with the scheduler's notifier.
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(
        config: PostpilotConfig,
        notifications: Arc<NotificationStore>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        let tokens = TokenVerifier::new(&config.auth.jwt_secret);
        Self {
            config,
            tokens,
            notifications,
            registry,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use crate::http::{health, notifications};

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ws/notifications", get(crate::ws::connection::ws_handler))
        .route("/api/notifications", get(notifications::list_handler))
        .route(
            "/api/notifications/mark-all-read",
            post(notifications::mark_all_read_handler),
        )
        .route(
            "/api/notifications/{id}/mark-read",
            post(notifications::mark_read_handler),
        )
        .route(
            "/api/notification-preferences",
            get(notifications::get_preferences_handler)
                .put(notifications::update_preferences_handler),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
