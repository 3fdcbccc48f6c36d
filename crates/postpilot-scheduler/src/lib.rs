//! `postpilot-scheduler`: scheduled-post execution with SQLite persistence.
//!
//! # Overview
//!
//! Posts live in the `scheduled_posts` table. The [`engine::SchedulerEngine`]
//! ticks on a fixed period and runs three phases serially:
//!
//! | Phase       | Component                                  |
//! |-------------|--------------------------------------------|
//! | Pre-alert   | [`prealert::PreAlertNotifier`]             |
//! | Due posts   | [`executor::Executor`]                     |
//! | Auto-reply  | optional [`engine::AutoReplyProcessor`]    |
//!
//! A due post moves `scheduled | ready → posted | failed` and is deactivated
//! in the same transaction. All times are UTC; see [`time`].

pub mod db;
pub mod engine;
pub mod error;
pub mod executor;
pub mod media;
pub mod prealert;
pub mod publisher;
pub mod store;
pub mod time;
pub mod types;

pub use engine::{AutoReplyProcessor, SchedulerControl, SchedulerEngine, TickSummary};
pub use error::{MediaError, PublishError, Result, SchedulerError};
pub use executor::{ExecutionReport, Executor};
pub use media::{ImageGenerator, MediaPreparer, MediaUploader, UnsupportedVideoGenerator, VideoGenerator};
pub use prealert::PreAlertNotifier;
pub use publisher::{PlatformPublisher, Publishers};
pub use store::{FinalState, PostStore};
pub use types::{
    AccountCredentials, NewScheduledPost, NewSocialAccount, PostMedia, PostStatus, ScheduledPost,
    SocialAccount,
};
