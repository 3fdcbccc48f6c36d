use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use postpilot_core::{Platform, UserId};
use rusqlite::{types::Type, Connection, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{NotifyError, Result};
use crate::types::{
    NewNotification, Notification, NotificationKind, NotificationPreferences, PreferencesUpdate,
};

const NOTIFICATION_COLUMNS: &str = "id, user_id, post_id, kind, platform, strategy_name, message,
     scheduled_time, error_message, is_read, created_at";

/// Persists notification records and per-user preferences.
///
/// Shared between the scan loop and HTTP handlers behind an `Arc`; the single
/// connection is serialised by a `Mutex` that is never held across an await.
pub struct NotificationStore {
    db: Mutex<Connection>,
}

impl NotificationStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Insert a notification and return the stored record.
    #[instrument(skip(self, new), fields(user_id = new.user_id, kind = %new.kind))]
    pub fn create(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            post_id: new.post_id,
            kind: new.kind,
            platform: new.platform,
            strategy_name: new.strategy_name,
            message: new.message,
            scheduled_time: new.scheduled_time,
            error_message: new.error_message,
            is_read: false,
            created_at: Utc::now(),
        };

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO notifications
             (id, user_id, post_id, kind, platform, strategy_name, message,
              scheduled_time, error_message, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
            rusqlite::params![
                notification.id,
                notification.user_id,
                notification.post_id,
                notification.kind.to_string(),
                notification.platform.as_str(),
                notification.strategy_name,
                notification.message,
                notification.scheduled_time.map(format_ts),
                notification.error_message,
                format_ts(notification.created_at),
            ],
        )?;
        info!(notification_id = %notification.id, "notification created");
        Ok(notification)
    }

    /// Notifications for `user_id`, newest first.
    pub fn list(&self, user_id: UserId, limit: u32, offset: u32) -> Result<Vec<Notification>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
            .query_map(rusqlite::params![user_id, limit, offset], row_to_notification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn unread_count(&self, user_id: UserId) -> Result<u64> {
        let db = self.db.lock().unwrap();
        let n: i64 = db.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Mark one notification read. Only the owner can do this.
    pub fn mark_read(&self, id: &str, user_id: UserId) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )?;
        if n == 0 {
            return Err(NotifyError::NotFound { id: id.to_string() });
        }
        debug!(notification_id = %id, "marked read");
        Ok(())
    }

    /// Mark every unread notification of `user_id` read. Returns rows changed.
    pub fn mark_all_read(&self, user_id: UserId) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
            [user_id],
        )?;
        info!(user_id, count = n, "marked all notifications read");
        Ok(n)
    }

    /// Preferences for `user_id`, creating the all-enabled row on first access.
    pub fn preferences(&self, user_id: UserId) -> Result<NotificationPreferences> {
        let db = self.db.lock().unwrap();
        load_or_create_preferences(&db, user_id)
    }

    /// Apply a partial update. `failure_enabled` is always stored as true.
    #[instrument(skip(self, update))]
    pub fn update_preferences(
        &self,
        user_id: UserId,
        update: &PreferencesUpdate,
    ) -> Result<NotificationPreferences> {
        let db = self.db.lock().unwrap();
        let prefs = load_or_create_preferences(&db, user_id)?.apply(update);
        db.execute(
            "UPDATE notification_preferences
             SET browser_notifications_enabled = ?2, pre_posting_enabled = ?3,
                 success_enabled = ?4, failure_enabled = ?5, updated_at = ?6
             WHERE user_id = ?1",
            rusqlite::params![
                user_id,
                prefs.browser_notifications_enabled,
                prefs.pre_posting_enabled,
                prefs.success_enabled,
                prefs.failure_enabled,
                format_ts(Utc::now()),
            ],
        )?;
        info!(user_id, "notification preferences updated");
        Ok(prefs)
    }

    /// Delete notifications older than `days`. Returns rows deleted.
    pub fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        self.cleanup_before(Utc::now() - Duration::days(days))
    }

    /// Delete notifications created strictly before `cutoff`.
    pub fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM notifications WHERE created_at < ?1",
            [format_ts(cutoff)],
        )?;
        if n > 0 {
            info!(count = n, "old notifications cleaned up");
        }
        Ok(n)
    }
}

fn load_or_create_preferences(db: &Connection, user_id: UserId) -> Result<NotificationPreferences> {
    let existing = db
        .query_row(
            "SELECT browser_notifications_enabled, pre_posting_enabled,
                    success_enabled, failure_enabled
             FROM notification_preferences WHERE user_id = ?1",
            [user_id],
            |row| {
                Ok(NotificationPreferences {
                    browser_notifications_enabled: row.get(0)?,
                    pre_posting_enabled: row.get(1)?,
                    success_enabled: row.get(2)?,
                    failure_enabled: row.get(3)?,
                })
            },
        )
        .optional()?;
    if let Some(prefs) = existing {
        return Ok(prefs);
    }

    let now = format_ts(Utc::now());
    db.execute(
        "INSERT OR IGNORE INTO notification_preferences (user_id, created_at, updated_at)
         VALUES (?1, ?2, ?2)",
        rusqlite::params![user_id, now],
    )?;
    info!(user_id, "created default notification preferences");
    Ok(NotificationPreferences::default())
}

/// Fixed-width UTC text so `ORDER BY` / `<` on the column follow time order.
fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_enum<T: FromStr<Err = String>>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    T::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let scheduled_time = match row.get::<_, Option<String>>(7)? {
        Some(raw) => Some(parse_ts(7, &raw)?),
        None => None,
    };
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        kind: parse_enum::<NotificationKind>(3, &row.get::<_, String>(3)?)?,
        platform: parse_enum::<Platform>(4, &row.get::<_, String>(4)?)?,
        strategy_name: row.get(5)?,
        message: row.get(6)?,
        scheduled_time,
        error_message: row.get(8)?,
        is_read: row.get(9)?,
        created_at: parse_ts(10, &row.get::<_, String>(10)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NotificationStore {
        NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn failure_for(user_id: UserId, message: &str) -> NewNotification {
        NewNotification {
            user_id,
            post_id: Some(42),
            kind: NotificationKind::Failure,
            platform: Platform::Instagram,
            strategy_name: Some("Scheduled Post".to_string()),
            message: message.to_string(),
            scheduled_time: None,
            error_message: Some("token expired".to_string()),
        }
    }

    #[test]
    fn list_is_newest_first_and_paginated() {
        let store = store();
        for i in 0..5 {
            store.create(failure_for(1, &format!("m{i}"))).unwrap();
        }
        store.create(failure_for(2, "other user")).unwrap();

        let page = store.list(1, 2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message, "m4");
        assert_eq!(page[1].message, "m3");

        let tail = store.list(1, 10, 4).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].message, "m0");
        assert_eq!(tail[0].error_message.as_deref(), Some("token expired"));
    }

    #[test]
    fn mark_read_is_scoped_to_owner() {
        let store = store();
        let n = store.create(failure_for(1, "x")).unwrap();

        assert!(matches!(
            store.mark_read(&n.id, 2),
            Err(NotifyError::NotFound { .. })
        ));
        store.mark_read(&n.id, 1).unwrap();
        assert!(store.list(1, 10, 0).unwrap()[0].is_read);
    }

    #[test]
    fn mark_all_read_only_touches_unread() {
        let store = store();
        let first = store.create(failure_for(1, "a")).unwrap();
        store.create(failure_for(1, "b")).unwrap();
        store.mark_read(&first.id, 1).unwrap();

        assert_eq!(store.unread_count(1).unwrap(), 1);
        assert_eq!(store.mark_all_read(1).unwrap(), 1);
        assert_eq!(store.unread_count(1).unwrap(), 0);
    }

    #[test]
    fn preferences_are_created_lazily_with_defaults() {
        let store = store();
        assert_eq!(
            store.preferences(9).unwrap(),
            NotificationPreferences::default()
        );
    }

    #[test]
    fn failure_enabled_survives_every_update() {
        let store = store();
        let update = PreferencesUpdate {
            pre_posting_enabled: Some(false),
            failure_enabled: Some(false),
            ..Default::default()
        };
        let prefs = store.update_preferences(3, &update).unwrap();
        assert!(!prefs.pre_posting_enabled);
        assert!(prefs.failure_enabled);

        let stored = store.preferences(3).unwrap();
        assert!(!stored.pre_posting_enabled);
        assert!(stored.failure_enabled);
    }

    #[test]
    fn cleanup_removes_only_old_rows() {
        let store = store();
        store.create(failure_for(1, "fresh")).unwrap();
        {
            let db = store.db.lock().unwrap();
            db.execute(
                "INSERT INTO notifications (id, user_id, kind, platform, message, created_at)
                 VALUES ('old', 1, 'success', 'facebook', 'stale', ?1)",
                [format_ts(Utc::now() - Duration::days(45))],
            )
            .unwrap();
        }

        assert_eq!(store.cleanup_older_than(30).unwrap(), 1);
        let left = store.list(1, 10, 0).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message, "fresh");
    }
}
