use thiserror::Error;

/// Errors raised by the notification subsystem.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Notification not found: {id}")]
    NotFound { id: String },
}

pub type Result<T> = std::result::Result<T, NotifyError>;
