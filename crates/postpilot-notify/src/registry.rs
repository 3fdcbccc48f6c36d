use dashmap::DashMap;
use postpilot_core::UserId;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

pub type ChannelId = Uuid;

/// Sending half of one live push connection (one browser tab).
///
/// The connection task owns the matching receiver and forwards every frame
/// to its socket. Dropping the receiver closes the channel.
#[derive(Debug, Clone)]
pub struct PushChannel {
    id: ChannelId,
    tx: mpsc::Sender<String>,
}

impl PushChannel {
    /// Create a channel with a bounded outbound queue of `capacity` frames.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }
}

/// Maps each user to the live channels they currently hold.
///
/// Mutated concurrently by connection accept/close tasks and by the scan
/// loop; each user entry is guarded by its DashMap shard lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// user_id -> channels in connection order.
    channels: DashMap<UserId, Vec<PushChannel>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `channel` for `user_id`, creating the entry if absent.
    pub fn register(&self, user_id: UserId, channel: PushChannel) -> ChannelId {
        let id = channel.id;
        let mut entry = self.channels.entry(user_id).or_default();
        entry.push(channel);
        info!(user_id, channel_id = %id, connections = entry.len(), "channel registered");
        id
    }

    /// Remove one channel. The user entry is dropped once it is empty.
    pub fn unregister(&self, user_id: UserId, channel_id: ChannelId) -> bool {
        let removed = match self.channels.get_mut(&user_id) {
            Some(mut chans) => {
                let before = chans.len();
                chans.retain(|c| c.id != channel_id);
                chans.len() != before
            }
            None => false,
        };
        self.channels.remove_if(&user_id, |_, chans| chans.is_empty());
        if removed {
            info!(user_id, channel_id = %channel_id, "channel unregistered");
        }
        removed
    }

    /// Send `payload` to every channel of `user_id`.
    ///
    /// Channels that are closed or whose queue is full are unregistered.
    /// Returns the number of successful sends; 0 when the user has no entry.
    pub fn broadcast(&self, user_id: UserId, payload: &str) -> usize {
        let mut sent = 0;
        let mut dead = Vec::new();
        {
            let Some(chans) = self.channels.get(&user_id) else {
                debug!(user_id, "no live channels");
                return 0;
            };
            for chan in chans.iter() {
                match chan.tx.try_send(payload.to_string()) {
                    Ok(()) => sent += 1,
                    Err(e) => {
                        debug!(user_id, channel_id = %chan.id, error = %e, "dropping dead channel");
                        dead.push(chan.id);
                    }
                }
            }
        }
        for id in dead {
            self.unregister(user_id, id);
        }
        sent
    }

    pub fn connection_count(&self, user_id: UserId) -> usize {
        self.channels.get(&user_id).map(|c| c.len()).unwrap_or(0)
    }

    /// Number of users with at least one live channel.
    pub fn user_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn broadcast_without_entry_returns_zero() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.broadcast(7, "{}"), 0);
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn broadcast_reaches_every_tab_in_order() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = PushChannel::new(4);
        let (b, mut rx_b) = PushChannel::new(4);
        registry.register(1, a);
        registry.register(1, b);

        assert_eq!(registry.broadcast(1, "hello"), 2);
        assert_eq!(rx_a.try_recv().unwrap(), "hello");
        assert_eq!(rx_b.try_recv().unwrap(), "hello");
    }

    #[test]
    fn closed_channels_are_pruned_on_send() {
        let registry = ConnectionRegistry::new();
        let (live, mut rx_live) = PushChannel::new(4);
        let (gone, rx_gone) = PushChannel::new(4);
        registry.register(1, live);
        registry.register(1, gone);
        drop(rx_gone);

        assert_eq!(registry.broadcast(1, "x"), 1);
        assert_eq!(registry.connection_count(1), 1);
        assert_eq!(rx_live.try_recv().unwrap(), "x");
    }

    #[test]
    fn full_queue_counts_as_dead() {
        let registry = ConnectionRegistry::new();
        let (slow, _rx) = PushChannel::new(1);
        registry.register(5, slow);

        assert_eq!(registry.broadcast(5, "first"), 1);
        assert_eq!(registry.broadcast(5, "second"), 0);
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn last_unregister_drops_the_entry() {
        let registry = ConnectionRegistry::new();
        let (chan, _rx) = PushChannel::new(1);
        let id = registry.register(3, chan);

        assert!(registry.unregister(3, id));
        assert!(!registry.unregister(3, id));
        assert_eq!(registry.user_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_and_broadcast() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let (chan, rx) = PushChannel::new(64);
                let id = registry.register(11, chan);
                registry.broadcast(11, "ping");
                (id, rx)
            }));
        }
        let mut receivers = Vec::new();
        for h in handles {
            receivers.push(h.await.unwrap());
        }
        assert_eq!(registry.connection_count(11), 32);

        for (id, _rx) in &receivers {
            registry.unregister(11, *id);
        }
        assert_eq!(registry.user_count(), 0);
    }
}
