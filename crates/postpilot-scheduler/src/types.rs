use chrono::{DateTime, Utc};
use postpilot_core::{Platform, PostKind, UserId};
use postpilot_notify::PostContext;
use serde::{Deserialize, Serialize};

/// Label used in notification text when a post has no strategy attached.
pub const DEFAULT_STRATEGY_NAME: &str = "Scheduled Post";

/// Lifecycle state of a scheduled post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Waiting for its scheduled time.
    Scheduled,
    /// Media already prepared by the composer; still waiting.
    Ready,
    /// Published; terminal.
    Posted,
    /// Could not be published; terminal.
    Failed,
}

impl PostStatus {
    /// Statuses the executor may pick up.
    pub fn is_pending(&self) -> bool {
        matches!(self, PostStatus::Scheduled | PostStatus::Ready)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Ready => "ready",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "ready" => Ok(PostStatus::Ready),
            "posted" => Ok(PostStatus::Posted),
            "failed" => Ok(PostStatus::Failed),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

/// Media attached to a post. The variant fixes the post kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "post_type", rename_all = "snake_case")]
pub enum PostMedia {
    Photo {
        image_url: Option<String>,
    },
    Carousel {
        #[serde(default)]
        media_urls: Vec<String>,
    },
    Reel {
        video_url: Option<String>,
        thumbnail_url: Option<String>,
    },
}

impl PostMedia {
    pub fn kind(&self) -> PostKind {
        match self {
            PostMedia::Photo { .. } => PostKind::Photo,
            PostMedia::Carousel { .. } => PostKind::Carousel,
            PostMedia::Reel { .. } => PostKind::Reel,
        }
    }
}

/// A persisted scheduled post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: i64,
    pub user_id: UserId,
    pub social_account_id: i64,
    pub platform: Platform,
    pub media: PostMedia,
    pub caption: String,
    /// Always UTC; see [`crate::time`].
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    /// False once the post reached a terminal state.
    pub is_active: bool,
    pub last_executed: Option<DateTime<Utc>>,
    pub platform_post_id: Option<String>,
    pub strategy_name: Option<String>,
}

impl ScheduledPost {
    pub fn strategy_label(&self) -> &str {
        self.strategy_name.as_deref().unwrap_or(DEFAULT_STRATEGY_NAME)
    }

    /// What the notifier needs to describe this post.
    pub fn context(&self) -> PostContext {
        PostContext {
            post_id: self.id,
            user_id: self.user_id,
            platform: self.platform,
            kind: self.media.kind(),
            caption: self.caption.clone(),
            strategy_name: self.strategy_label().to_string(),
            scheduled_time: self.scheduled_at,
        }
    }
}

/// Insert request for [`crate::store::PostStore::insert`].
///
/// `scheduled_at` is the raw value the composer sent: RFC 3339 with an
/// offset, or a naive timestamp which is taken as UTC.
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub user_id: UserId,
    pub social_account_id: i64,
    pub platform: Platform,
    pub media: PostMedia,
    pub caption: String,
    pub scheduled_at: String,
    pub strategy_name: Option<String>,
}

/// A linked social-network account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: i64,
    pub user_id: UserId,
    pub platform: Platform,
    pub display_name: String,
    /// Instagram business user id or Facebook page id.
    pub platform_user_id: Option<String>,
    pub access_token: Option<String>,
    pub is_connected: bool,
}

impl SocialAccount {
    /// Publishing credentials; `None` unless connected with both fields set.
    pub fn credentials(&self) -> Option<AccountCredentials> {
        if !self.is_connected {
            return None;
        }
        match (&self.platform_user_id, &self.access_token) {
            (Some(uid), Some(token)) if !uid.is_empty() && !token.is_empty() => {
                Some(AccountCredentials {
                    platform_user_id: uid.clone(),
                    access_token: token.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Insert request for [`crate::store::PostStore::insert_account`].
#[derive(Debug, Clone)]
pub struct NewSocialAccount {
    pub user_id: UserId,
    pub platform: Platform,
    pub display_name: String,
    pub platform_user_id: Option<String>,
    pub access_token: Option<String>,
    pub is_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub platform_user_id: String,
    pub access_token: String,
}
