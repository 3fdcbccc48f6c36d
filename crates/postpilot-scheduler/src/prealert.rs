use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use postpilot_core::config::SchedulerConfig;
use postpilot_notify::Notifier;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::store::PostStore;
use crate::time::minutes_until;

/// Sends one reminder per post each time it enters the pre-alert window.
///
/// `notified` holds the ids currently inside their window. An id leaves the
/// set when its post leaves the window or stops being an active scheduled
/// post, so re-entering the window earns exactly one more reminder.
pub struct PreAlertNotifier {
    store: Arc<PostStore>,
    notifier: Notifier,
    /// Inclusive `[min, max]` minutes before the scheduled time.
    window: (i64, i64),
    notified: HashSet<i64>,
}

impl PreAlertNotifier {
    pub fn new(store: Arc<PostStore>, notifier: Notifier, config: &SchedulerConfig) -> Self {
        Self {
            store,
            notifier,
            window: config.reminder_window(),
            notified: HashSet::new(),
        }
    }

    /// Scan active scheduled posts at `now`. Returns how many reminders went out.
    pub fn scan(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let posts = self.store.scheduled_active()?;
        let live: HashSet<i64> = posts.iter().map(|p| p.id).collect();
        self.notified.retain(|id| live.contains(id));

        let (lo, hi) = self.window;
        let mut sent = 0;
        for post in &posts {
            let minutes = minutes_until(post.scheduled_at, now);
            if !(lo..=hi).contains(&minutes) {
                self.notified.remove(&post.id);
                continue;
            }
            if !self.notified.insert(post.id) {
                continue;
            }

            match self.notifier.pre_posting(&post.context(), minutes) {
                Ok(Some(_)) => {
                    info!(post_id = post.id, user_id = post.user_id, minutes_until = minutes, "pre-alert sent");
                    sent += 1;
                }
                Ok(None) => debug!(post_id = post.id, "pre-alert suppressed by preferences"),
                Err(e) => {
                    // Nothing was pushed; try again next tick.
                    self.notified.remove(&post.id);
                    error!(post_id = post.id, "pre-alert failed: {e}");
                }
            }
        }
        Ok(sent)
    }

    /// Ids currently inside their window.
    pub fn tracked(&self) -> usize {
        self.notified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FinalState;
    use crate::types::{NewScheduledPost, PostMedia, PostStatus};
    use chrono::{Duration, TimeZone};
    use postpilot_core::Platform;
    use postpilot_notify::{ConnectionRegistry, NotificationStore, PushChannel};
    use rusqlite::Connection;

    struct Fixture {
        store: Arc<PostStore>,
        alerts: PreAlertNotifier,
        rx: tokio::sync::mpsc::Receiver<String>,
        now: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(PostStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let registry = Arc::new(ConnectionRegistry::new());
        let (chan, rx) = PushChannel::new(32);
        registry.register(1, chan);
        let notifier = Notifier::new(
            Arc::new(NotificationStore::new(Connection::open_in_memory().unwrap()).unwrap()),
            registry,
        );
        let alerts = PreAlertNotifier::new(Arc::clone(&store), notifier, &SchedulerConfig::default());
        Fixture {
            store,
            alerts,
            rx,
            now: Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
        }
    }

    fn schedule(store: &PostStore, at: DateTime<Utc>) -> i64 {
        store
            .insert(NewScheduledPost {
                user_id: 1,
                social_account_id: 1,
                platform: Platform::Instagram,
                media: PostMedia::Photo { image_url: None },
                caption: "launch day".into(),
                scheduled_at: at.to_rfc3339(),
                strategy_name: Some("Launch".into()),
            })
            .unwrap()
            .id
    }

    fn drain(rx: &mut tokio::sync::mpsc::Receiver<String>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn one_reminder_while_inside_window() {
        let mut f = fixture();
        schedule(&f.store, f.now + Duration::minutes(12));

        let mut total = 0;
        for tick in 0..10 {
            total += f.alerts.scan(f.now + Duration::seconds(30 * tick)).unwrap();
        }
        assert_eq!(total, 1);
        // stored record frame plus the reminder frame
        assert_eq!(drain(&mut f.rx), 2);
    }

    #[test]
    fn outside_window_sends_nothing() {
        let mut f = fixture();
        schedule(&f.store, f.now + Duration::minutes(13));
        schedule(&f.store, f.now + Duration::minutes(7));
        assert_eq!(f.alerts.scan(f.now).unwrap(), 0);
        assert_eq!(f.alerts.tracked(), 0);
    }

    #[test]
    fn leaving_and_reentering_allows_one_more() {
        let mut f = fixture();
        let at = f.now + Duration::minutes(10);
        schedule(&f.store, at);

        assert_eq!(f.alerts.scan(f.now).unwrap(), 1);
        // Clock jumps past the window, then back (e.g. host clock correction).
        assert_eq!(f.alerts.scan(f.now + Duration::minutes(5)).unwrap(), 0);
        assert_eq!(f.alerts.tracked(), 0);
        assert_eq!(f.alerts.scan(f.now).unwrap(), 1);
        assert_eq!(f.alerts.scan(f.now).unwrap(), 0);
    }

    #[test]
    fn finished_posts_are_forgotten() {
        let mut f = fixture();
        let id = schedule(&f.store, f.now + Duration::minutes(9));
        assert_eq!(f.alerts.scan(f.now).unwrap(), 1);
        assert_eq!(f.alerts.tracked(), 1);

        f.store
            .finish(
                id,
                &FinalState {
                    status: PostStatus::Failed,
                    media: PostMedia::Photo { image_url: None },
                    platform_post_id: None,
                    executed_at: f.now,
                },
            )
            .unwrap();
        assert_eq!(f.alerts.scan(f.now).unwrap(), 0);
        assert_eq!(f.alerts.tracked(), 0);
    }
}
