use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No post with the given id exists in the store.
    #[error("Post not found: {id}")]
    PostNotFound { id: i64 },

    /// A scheduled time that is neither RFC 3339 nor a recognised naive form.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The auto-reply processor reported a failure.
    #[error("Auto-reply error: {0}")]
    AutoReply(String),

    /// A stored post row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Failures while resolving a post's media. Every variant is fatal for the post.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid inline image: {0}")]
    InvalidDataUri(String),

    #[error("image generation failed: {0}")]
    Generation(String),

    #[error("video generation failed: {0}")]
    VideoGeneration(String),

    #[error("upload failed: {0}")]
    Upload(String),

    /// Carousel generation produced fewer usable images than the minimum.
    #[error("only {got} of {needed} carousel images could be generated")]
    NotEnoughImages { got: usize, needed: usize },

    #[error("{0}")]
    MissingMedia(String),
}

/// Failure reported by a platform publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The platform refused the post; carries its error text.
    #[error("{0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("request failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
