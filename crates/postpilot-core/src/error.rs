use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostpilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PostpilotError {
    /// Short error code string sent to clients in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PostpilotError::Config(_) => "CONFIG_ERROR",
            PostpilotError::AuthFailed(_) => "AUTH_FAILED",
            PostpilotError::NotFound(_) => "NOT_FOUND",
            PostpilotError::InvalidRequest(_) => "INVALID_REQUEST",
            PostpilotError::Database(_) => "DATABASE_ERROR",
            PostpilotError::Serialization(_) => "SERIALIZATION_ERROR",
            PostpilotError::Io(_) => "IO_ERROR",
            PostpilotError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PostpilotError>;
