use rusqlite::Connection;

use crate::error::Result;

/// Initialise the notification schema in `conn`. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS notifications (
            id              TEXT    NOT NULL PRIMARY KEY,
            user_id         INTEGER NOT NULL,
            post_id         INTEGER,
            kind            TEXT    NOT NULL,   -- pre_posting | success | failure
            platform        TEXT    NOT NULL,
            strategy_name   TEXT,
            message         TEXT    NOT NULL,
            scheduled_time  TEXT,               -- RFC 3339 UTC or NULL
            error_message   TEXT,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT    NOT NULL
        );

        -- Newest-first listing per user.
        CREATE INDEX IF NOT EXISTS idx_notifications_user_created
            ON notifications (user_id, created_at);

        CREATE TABLE IF NOT EXISTS notification_preferences (
            user_id                       INTEGER NOT NULL PRIMARY KEY,
            browser_notifications_enabled INTEGER NOT NULL DEFAULT 1,
            pre_posting_enabled           INTEGER NOT NULL DEFAULT 1,
            success_enabled               INTEGER NOT NULL DEFAULT 1,
            failure_enabled               INTEGER NOT NULL DEFAULT 1,
            created_at                    TEXT    NOT NULL,
            updated_at                    TEXT    NOT NULL
        );
        ",
    )?;
    Ok(())
}
