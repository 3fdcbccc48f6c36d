use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use postpilot_core::{Platform, PostKind};
use rusqlite::{types::Type, Connection, OptionalExtension, Row};
use tracing::{info, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, SchedulerError};
use crate::time::{format_ts, normalize};
use crate::types::{
    NewScheduledPost, NewSocialAccount, PostMedia, PostStatus, ScheduledPost, SocialAccount,
};

const POST_COLUMNS: &str = "id, user_id, social_account_id, platform, post_type, caption,
     image_url, media_urls, video_url, thumbnail_url, scheduled_at, status, is_active,
     last_executed, platform_post_id, strategy_name";

/// Terminal state written by the executor in one transaction.
#[derive(Debug, Clone)]
pub struct FinalState {
    pub status: PostStatus,
    pub media: PostMedia,
    pub platform_post_id: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Scheduled posts and the social accounts they publish through.
pub struct PostStore {
    db: Mutex<Connection>,
}

impl PostStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Persist a new post in `scheduled`. The scheduled time is normalised to UTC.
    #[instrument(skip(self, new), fields(user_id = new.user_id, platform = %new.platform))]
    pub fn insert(&self, new: NewScheduledPost) -> Result<ScheduledPost> {
        let scheduled_at = normalize(&new.scheduled_at)
            .ok_or_else(|| SchedulerError::InvalidTimestamp(new.scheduled_at.clone()))?;
        let now = format_ts(Utc::now());
        let cols = MediaColumns::from(&new.media);

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO scheduled_posts
             (user_id, social_account_id, platform, post_type, caption, image_url,
              media_urls, video_url, thumbnail_url, scheduled_at, status, is_active,
              strategy_name, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,'scheduled',1,?11,?12,?12)",
            rusqlite::params![
                new.user_id,
                new.social_account_id,
                new.platform.as_str(),
                cols.post_type,
                new.caption,
                cols.image_url,
                cols.media_urls,
                cols.video_url,
                cols.thumbnail_url,
                format_ts(scheduled_at),
                new.strategy_name,
                now,
            ],
        )?;
        let id = db.last_insert_rowid();
        info!(post_id = id, scheduled_at = %format_ts(scheduled_at), "post scheduled");

        Ok(ScheduledPost {
            id,
            user_id: new.user_id,
            social_account_id: new.social_account_id,
            platform: new.platform,
            media: new.media,
            caption: new.caption,
            scheduled_at,
            status: PostStatus::Scheduled,
            is_active: true,
            last_executed: None,
            platform_post_id: None,
            strategy_name: new.strategy_name,
        })
    }

    pub fn get(&self, id: i64) -> Result<ScheduledPost> {
        let db = self.db.lock().unwrap();
        db.query_row(
            &format!("SELECT {POST_COLUMNS} FROM scheduled_posts WHERE id = ?1"),
            [id],
            row_to_post,
        )
        .optional()?
        .ok_or(SchedulerError::PostNotFound { id })
    }

    /// Active posts still in `scheduled`; the pre-alert candidates.
    pub fn scheduled_active(&self) -> Result<Vec<ScheduledPost>> {
        self.select_where("status = 'scheduled' AND is_active = 1")
    }

    /// Active `scheduled`/`ready` posts on `platforms` whose time is at or before `now`.
    ///
    /// Filtering on time happens after normalisation so legacy naive rows
    /// compare correctly. Oldest first.
    pub fn due(&self, now: DateTime<Utc>, platforms: &[Platform]) -> Result<Vec<ScheduledPost>> {
        let mut posts: Vec<ScheduledPost> = self
            .select_where("status IN ('scheduled', 'ready') AND is_active = 1")?
            .into_iter()
            .filter(|p| platforms.contains(&p.platform) && p.scheduled_at <= now)
            .collect();
        posts.sort_by_key(|p| (p.scheduled_at, p.id));
        Ok(posts)
    }

    /// Store resolved media ahead of publishing.
    pub fn save_media(&self, id: i64, media: &PostMedia) -> Result<()> {
        let cols = MediaColumns::from(media);
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE scheduled_posts
             SET image_url = ?2, media_urls = ?3, video_url = ?4, thumbnail_url = ?5,
                 updated_at = ?6
             WHERE id = ?1",
            rusqlite::params![
                id,
                cols.image_url,
                cols.media_urls,
                cols.video_url,
                cols.thumbnail_url,
                format_ts(Utc::now()),
            ],
        )?;
        if n == 0 {
            return Err(SchedulerError::PostNotFound { id });
        }
        Ok(())
    }

    /// Write a post's terminal state and deactivate it, atomically.
    ///
    /// Fails with `PostNotFound` when the post is unknown or already inactive.
    #[instrument(skip(self, state), fields(status = %state.status))]
    pub fn finish(&self, id: i64, state: &FinalState) -> Result<()> {
        let cols = MediaColumns::from(&state.media);
        let executed = format_ts(state.executed_at);

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let n = tx.execute(
            "UPDATE scheduled_posts
             SET status = ?2, is_active = 0, last_executed = ?3, platform_post_id = ?4,
                 image_url = ?5, media_urls = ?6, video_url = ?7, thumbnail_url = ?8,
                 updated_at = ?3
             WHERE id = ?1 AND is_active = 1",
            rusqlite::params![
                id,
                state.status.to_string(),
                executed,
                state.platform_post_id,
                cols.image_url,
                cols.media_urls,
                cols.video_url,
                cols.thumbnail_url,
            ],
        )?;
        if n == 0 {
            // Dropping `tx` rolls back.
            return Err(SchedulerError::PostNotFound { id });
        }
        tx.commit()?;
        info!(post_id = id, "post finished");
        Ok(())
    }

    pub fn insert_account(&self, new: NewSocialAccount) -> Result<SocialAccount> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO social_accounts
             (user_id, platform, display_name, platform_user_id, access_token,
              is_connected, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            rusqlite::params![
                new.user_id,
                new.platform.as_str(),
                new.display_name,
                new.platform_user_id,
                new.access_token,
                new.is_connected,
                format_ts(Utc::now()),
            ],
        )?;
        Ok(SocialAccount {
            id: db.last_insert_rowid(),
            user_id: new.user_id,
            platform: new.platform,
            display_name: new.display_name,
            platform_user_id: new.platform_user_id,
            access_token: new.access_token,
            is_connected: new.is_connected,
        })
    }

    pub fn account(&self, id: i64) -> Result<Option<SocialAccount>> {
        let db = self.db.lock().unwrap();
        let account = db
            .query_row(
                "SELECT id, user_id, platform, display_name, platform_user_id,
                        access_token, is_connected
                 FROM social_accounts WHERE id = ?1",
                [id],
                |row| {
                    Ok(SocialAccount {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        platform: parse_text(row, 2)?,
                        display_name: row.get(3)?,
                        platform_user_id: row.get(4)?,
                        access_token: row.get(5)?,
                        is_connected: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    /// Rows that cannot be mapped are failed and deactivated in place so they
    /// drop out of every later scan.
    fn select_where(&self, clause: &str) -> Result<Vec<ScheduledPost>> {
        let db = self.db.lock().unwrap();
        let mut posts = Vec::new();
        let mut corrupt = Vec::new();
        {
            let mut stmt = db.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM scheduled_posts WHERE {clause}"
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                match row_to_post(row) {
                    Ok(post) => posts.push(post),
                    Err(e) => {
                        let id: i64 = row.get(0)?;
                        corrupt.push((id, SchedulerError::CorruptRow(format!("post {id}: {e}"))));
                    }
                }
            }
        }

        let now = format_ts(Utc::now());
        for (id, err) in corrupt {
            warn!(post_id = id, "{err}; marking failed");
            db.execute(
                "UPDATE scheduled_posts
                 SET status = 'failed', is_active = 0, last_executed = ?2, updated_at = ?2
                 WHERE id = ?1 AND is_active = 1",
                rusqlite::params![id, now],
            )?;
        }
        Ok(posts)
    }
}

/// `PostMedia` flattened onto the table's media columns.
struct MediaColumns {
    post_type: &'static str,
    image_url: Option<String>,
    media_urls: String,
    video_url: Option<String>,
    thumbnail_url: Option<String>,
}

impl From<&PostMedia> for MediaColumns {
    fn from(media: &PostMedia) -> Self {
        let mut cols = MediaColumns {
            post_type: media.kind().as_str(),
            image_url: None,
            media_urls: "[]".to_string(),
            video_url: None,
            thumbnail_url: None,
        };
        match media {
            PostMedia::Photo { image_url } => cols.image_url = image_url.clone(),
            PostMedia::Carousel { media_urls } => {
                cols.media_urls =
                    serde_json::to_string(media_urls).unwrap_or_else(|_| "[]".to_string());
            }
            PostMedia::Reel {
                video_url,
                thumbnail_url,
            } => {
                cols.video_url = video_url.clone();
                cols.thumbnail_url = thumbnail_url.clone();
            }
        }
        cols
    }
}

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<ScheduledPost> {
    let kind: PostKind = parse_text(row, 4)?;
    let media = match kind {
        PostKind::Photo => PostMedia::Photo {
            image_url: row.get(6)?,
        },
        PostKind::Carousel => {
            let raw: String = row.get(7)?;
            let media_urls = serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
            })?;
            PostMedia::Carousel { media_urls }
        }
        PostKind::Reel => PostMedia::Reel {
            video_url: row.get(8)?,
            thumbnail_url: row.get(9)?,
        },
    };

    let scheduled_raw: String = row.get(10)?;
    let scheduled_at = normalize(&scheduled_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            Type::Text,
            format!("bad scheduled_at: {scheduled_raw}").into(),
        )
    })?;
    let last_executed = row
        .get::<_, Option<String>>(13)?
        .and_then(|raw| normalize(&raw));

    Ok(ScheduledPost {
        id: row.get(0)?,
        user_id: row.get(1)?,
        social_account_id: row.get(2)?,
        platform: parse_text(row, 3)?,
        media,
        caption: row.get(5)?,
        scheduled_at,
        status: parse_text(row, 11)?,
        is_active: row.get(12)?,
        last_executed,
        platform_post_id: row.get(14)?,
        strategy_name: row.get(15)?,
    })
}

fn parse_text<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
