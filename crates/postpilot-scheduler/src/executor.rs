use std::sync::Arc;

use chrono::{DateTime, Utc};
use postpilot_core::Platform;
use postpilot_notify::Notifier;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::media::MediaPreparer;
use crate::publisher::Publishers;
use crate::store::{FinalState, PostStore};
use crate::types::{PostMedia, PostStatus, ScheduledPost};

/// Counts from one due-post scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub posted: usize,
    pub failed: usize,
}

/// Where a post got to before it stopped.
struct Attempt {
    media: PostMedia,
    result: std::result::Result<String, String>,
}

impl Attempt {
    fn failed(media: &PostMedia, reason: impl Into<String>) -> Self {
        Self {
            media: media.clone(),
            result: Err(reason.into()),
        }
    }
}

/// Drives due posts through media resolution and publishing to a terminal state.
pub struct Executor {
    store: Arc<PostStore>,
    notifier: Notifier,
    media: MediaPreparer,
    publishers: Publishers,
    platforms: Vec<Platform>,
}

impl Executor {
    pub fn new(
        store: Arc<PostStore>,
        notifier: Notifier,
        media: MediaPreparer,
        publishers: Publishers,
        platforms: Vec<Platform>,
    ) -> Self {
        Self {
            store,
            notifier,
            media,
            publishers,
            platforms,
        }
    }

    /// Execute every post due at `now`, one at a time.
    ///
    /// A failing post never stops the scan; it is logged and counted as failed.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<ExecutionReport> {
        let due = self.store.due(now, &self.platforms)?;
        let mut report = ExecutionReport::default();
        if due.is_empty() {
            return Ok(report);
        }
        info!(count = due.len(), "processing due posts");

        for post in due {
            match self.execute(&post).await {
                Ok(PostStatus::Posted) => report.posted += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    error!(post_id = post.id, "post execution error: {e}");
                    report.failed += 1;
                }
            }
        }
        info!(posted = report.posted, failed = report.failed, "due posts processed");
        Ok(report)
    }

    /// Run one post to completion and report the outcome to its owner.
    ///
    /// Every outcome ends in a terminal write; only a failing write is
    /// returned as an error.
    #[instrument(skip(self, post), fields(post_id = post.id, platform = %post.platform))]
    pub async fn execute(&self, post: &ScheduledPost) -> Result<PostStatus> {
        let attempt = match self.attempt(post).await {
            Ok(attempt) => attempt,
            Err(e) => {
                error!("post attempt aborted: {e}");
                Attempt::failed(&post.media, e.to_string())
            }
        };
        let status = if attempt.result.is_ok() {
            PostStatus::Posted
        } else {
            PostStatus::Failed
        };

        self.store.finish(
            post.id,
            &FinalState {
                status,
                media: attempt.media,
                platform_post_id: attempt.result.as_ref().ok().cloned(),
                executed_at: Utc::now(),
            },
        )?;

        let ctx = post.context();
        match &attempt.result {
            Ok(platform_post_id) => {
                info!(platform_post_id = %platform_post_id, "post published");
                if let Err(e) = self.notifier.post_succeeded(&ctx, Some(platform_post_id)) {
                    error!("success notification failed: {e}");
                }
            }
            Err(reason) => {
                warn!(reason = %reason, "post failed");
                if let Err(e) = self.notifier.post_failed(&ctx, reason) {
                    error!("failure notification failed: {e}");
                }
            }
        }
        Ok(status)
    }

    async fn attempt(&self, post: &ScheduledPost) -> Result<Attempt> {
        if post.caption.trim().is_empty() {
            return Ok(Attempt::failed(&post.media, "Post caption is empty"));
        }

        let media = match self.media.prepare(&post.caption, &post.media).await {
            Ok(media) => media,
            Err(e) => return Ok(Attempt::failed(&post.media, e.to_string())),
        };
        if media != post.media {
            if let Err(e) = self.store.save_media(post.id, &media) {
                warn!("could not persist resolved media: {e}");
            }
        }

        let Some(account) = self.store.account(post.social_account_id)? else {
            return Ok(Attempt::failed(&media, "Social account not found"));
        };
        let Some(credentials) = account.credentials() else {
            return Ok(Attempt::failed(
                &media,
                format!("{} account is not connected", post.platform.label()),
            ));
        };
        let Some(publisher) = self.publishers.get(post.platform) else {
            return Ok(Attempt::failed(
                &media,
                format!("No publisher configured for {}", post.platform.label()),
            ));
        };

        let result = publisher
            .publish(&credentials, &post.caption, &media)
            .await
            .map_err(|e| e.to_string());
        Ok(Attempt { media, result })
    }
}
