pub mod health;
pub mod notifications;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use postpilot_core::PostpilotError;
use postpilot_notify::NotifyError;
use serde_json::json;
use tracing::error;

/// Error body: `{"error": {"code": "...", "message": "..."}}`.
pub struct ApiError(pub PostpilotError);

impl From<PostpilotError> for ApiError {
    fn from(e: PostpilotError) -> Self {
        ApiError(e)
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        ApiError(match e {
            NotifyError::NotFound { id } => {
                PostpilotError::NotFound(format!("notification {id}"))
            }
            NotifyError::Database(e) => PostpilotError::Database(e.to_string()),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PostpilotError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            PostpilotError::NotFound(_) => StatusCode::NOT_FOUND,
            PostpilotError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(code = self.0.code(), "request failed: {}", self.0);
        }
        let body = json!({
            "error": { "code": self.0.code(), "message": self.0.to_string() }
        });
        (status, Json(body)).into_response()
    }
}
