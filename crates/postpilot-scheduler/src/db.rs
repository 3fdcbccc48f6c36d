use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates `social_accounts` and `scheduled_posts` (idempotent) and an index
/// on `(status, is_active)` for the per-tick scans.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS social_accounts (
            id                INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            user_id           INTEGER NOT NULL,
            platform          TEXT    NOT NULL,   -- instagram | facebook
            display_name      TEXT    NOT NULL,
            platform_user_id  TEXT,
            access_token      TEXT,
            is_connected      INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT    NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS scheduled_posts (
            id                 INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
            user_id            INTEGER NOT NULL,
            social_account_id  INTEGER NOT NULL,
            platform           TEXT    NOT NULL,
            post_type          TEXT    NOT NULL,   -- photo | carousel | reel
            caption            TEXT    NOT NULL DEFAULT '',
            image_url          TEXT,
            media_urls         TEXT    NOT NULL DEFAULT '[]',   -- JSON array
            video_url          TEXT,
            thumbnail_url      TEXT,
            scheduled_at       TEXT    NOT NULL,   -- RFC 3339 UTC; legacy rows may be naive
            status             TEXT    NOT NULL DEFAULT 'scheduled',
            is_active          INTEGER NOT NULL DEFAULT 1,
            last_executed      TEXT,
            platform_post_id   TEXT,
            strategy_name      TEXT,
            created_at         TEXT    NOT NULL,
            updated_at         TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_scheduled_posts_status
            ON scheduled_posts (status, is_active);
        ",
    )?;
    Ok(())
}
