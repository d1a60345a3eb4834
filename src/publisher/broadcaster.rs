//! In-process publisher fanning events out to per-subscriber buffers.

use crate::events::RelayEvent;
use crate::types::{Channel, TenantKey};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::types::{BroadcasterConfig, SubscriberHandle, SubscriberId};
use super::{Publisher, ReplayProvider};

/// Internal subscriber state.
struct Subscriber {
    tenant: TenantKey,
    sender: Sender<RelayEvent>,
}

impl Subscriber {
    /// Try to send an event. Returns false if the subscriber should be dropped.
    fn try_send(&self, event: RelayEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Publishes one channel's events to subscribers, keyed by tenant.
pub struct Broadcaster {
    channel: Channel,
    config: BroadcasterConfig,
    /// Active subscribers by ID.
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    /// Replay providers by tenant.
    providers: RwLock<HashMap<TenantKey, Arc<dyn ReplayProvider>>>,
    /// Counter for generating subscriber IDs.
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new(channel: Channel, config: BroadcasterConfig) -> Self {
        Self {
            channel,
            config,
            subscribers: RwLock::new(HashMap::new()),
            providers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Connect a subscriber to `tenant`'s stream on this channel.
    ///
    /// The subscriber is registered for live events before the replay
    /// provider is invoked, so every event published after this call is
    /// buffered behind the snapshot.
    pub fn subscribe(&self, tenant: impl Into<TenantKey>) -> SubscriberHandle {
        let tenant = tenant.into();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, live) = bounded(self.config.buffer_size);

        self.subscribers.write().insert(
            id,
            Subscriber {
                tenant: tenant.clone(),
                sender,
            },
        );

        let provider = self.providers.read().get(&tenant).cloned();
        let replay = provider.map(|provider| provider.replay());

        tracing::debug!(
            channel = %self.channel,
            tenant = %tenant,
            subscriber = id.0,
            replay = replay.is_some(),
            "Subscriber connected"
        );

        SubscriberHandle {
            id,
            tenant,
            replay,
            replay_deadline: Instant::now() + self.config.replay_timeout,
            live,
        }
    }

    /// Disconnect a subscriber. Its stream ends once drained.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!(channel = %self.channel, subscriber = id.0, "Subscriber removed");
        }
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn tenant_subscriber_count(&self, tenant: &TenantKey) -> usize {
        self.subscribers
            .read()
            .values()
            .filter(|sub| &sub.tenant == tenant)
            .count()
    }
}

impl Publisher for Broadcaster {
    fn register(&self, tenant: TenantKey, provider: Arc<dyn ReplayProvider>) {
        self.providers.write().insert(tenant, provider);
    }

    fn unregister(&self, tenant: &TenantKey) {
        if self.providers.write().remove(tenant).is_some() {
            tracing::debug!(tenant = %tenant, channel = %self.channel, "Replay provider removed");
        }
    }

    /// Drops subscribers that fail to receive.
    fn publish(&self, tenants: &[TenantKey], event: RelayEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, sub) in subs.iter() {
                if tenants.contains(&sub.tenant) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::warn!(
                        channel = %self.channel,
                        tenant = %sub.tenant,
                        subscriber = id.0,
                        "Dropping subscriber that stopped keeping up"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use std::time::Duration;

    fn put(data: &str) -> RelayEvent {
        RelayEvent::Put {
            data: data.to_string(),
        }
    }

    /// Replays a fixed event, or nothing.
    struct FixedReplay(Option<RelayEvent>);

    impl ReplayProvider for FixedReplay {
        fn replay(&self) -> Receiver<RelayEvent> {
            let (tx, rx) = bounded(1);
            if let Some(event) = self.0.clone() {
                tx.send(event).unwrap();
            }
            rx
        }
    }

    /// Never finishes replaying while the sender is held.
    struct StuckReplay(parking_lot::Mutex<Vec<Sender<RelayEvent>>>);

    impl ReplayProvider for StuckReplay {
        fn replay(&self) -> Receiver<RelayEvent> {
            let (tx, rx) = bounded(1);
            self.0.lock().push(tx);
            rx
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());

        let handle = broadcaster.subscribe("a");
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.tenant_subscriber_count(&"a".into()), 1);

        broadcaster.unsubscribe(handle.id);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_to_tenant() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
        let mut a = broadcaster.subscribe("a");
        let mut b = broadcaster.subscribe("b");

        broadcaster.publish(&["a".into()], put("{}"));

        assert_eq!(a.recv_timeout(Duration::from_millis(100)).unwrap(), put("{}"));
        assert!(b.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_publish_to_several_tenants() {
        let broadcaster = Broadcaster::new(Channel::All, BroadcasterConfig::default());
        let mut a = broadcaster.subscribe("a");
        let mut b = broadcaster.subscribe("b");

        broadcaster.publish(&["a".into(), "b".into()], RelayEvent::Heartbeat);

        assert!(a.try_recv().unwrap().is_heartbeat());
        assert!(b.try_recv().unwrap().is_heartbeat());
    }

    #[test]
    fn test_replay_precedes_live() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
        broadcaster.register("a".into(), Arc::new(FixedReplay(Some(put("snapshot")))));

        let mut handle = broadcaster.subscribe("a");
        broadcaster.publish(&["a".into()], put("live"));

        assert_eq!(handle.recv().unwrap(), put("snapshot"));
        assert_eq!(handle.recv().unwrap(), put("live"));
    }

    #[test]
    fn test_empty_replay_goes_straight_to_live() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
        broadcaster.register("a".into(), Arc::new(FixedReplay(None)));

        let mut handle = broadcaster.subscribe("a");
        broadcaster.publish(&["a".into()], put("live"));

        assert_eq!(handle.try_recv().unwrap(), put("live"));
        assert!(!handle.replay_pending());
    }

    #[test]
    fn test_pending_replay_holds_back_live() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
        let stuck = Arc::new(StuckReplay(parking_lot::Mutex::new(Vec::new())));
        broadcaster.register("a".into(), stuck.clone());

        let mut handle = broadcaster.subscribe("a");
        broadcaster.publish(&["a".into()], put("live"));

        assert!(handle.try_recv().is_err());
        assert!(handle.replay_pending());

        stuck.0.lock()[0].send(put("snapshot")).unwrap();
        assert_eq!(handle.try_recv().unwrap(), put("snapshot"));
        assert_eq!(handle.try_recv().unwrap(), put("live"));
    }

    #[test]
    fn test_replay_timeout_falls_back_to_live() {
        let config = BroadcasterConfig {
            replay_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let broadcaster = Broadcaster::new(Channel::Flags, config);
        let stuck = Arc::new(StuckReplay(parking_lot::Mutex::new(Vec::new())));
        broadcaster.register("a".into(), stuck);

        let mut handle = broadcaster.subscribe("a");
        broadcaster.publish(&["a".into()], put("live"));

        assert_eq!(handle.recv().unwrap(), put("live"));
        assert!(!handle.replay_pending());
    }

    #[test]
    fn test_unregistered_tenant_has_no_replay() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
        broadcaster.register("a".into(), Arc::new(FixedReplay(Some(put("snapshot")))));
        broadcaster.unregister(&"a".into());

        let handle = broadcaster.subscribe("a");
        assert!(!handle.replay_pending());
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let config = BroadcasterConfig {
            buffer_size: 2,
            ..Default::default()
        };
        let broadcaster = Broadcaster::new(Channel::Flags, config);
        let mut slow = broadcaster.subscribe("a");

        for i in 0..10 {
            broadcaster.publish(&["a".into()], put(&i.to_string()));
        }

        assert_eq!(broadcaster.subscriber_count(), 0);

        // Buffered events still drain, then the stream ends
        assert_eq!(slow.recv().unwrap(), put("0"));
        assert_eq!(slow.recv().unwrap(), put("1"));
        assert!(slow.recv().is_err());
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let config = BroadcasterConfig {
            buffer_size: 2,
            ..Default::default()
        };
        let broadcaster = Broadcaster::new(Channel::Flags, config);
        let _slow = broadcaster.subscribe("a");
        let mut fast = broadcaster.subscribe("a");

        for i in 0..5 {
            broadcaster.publish(&["a".into()], put(&i.to_string()));
            assert_eq!(fast.recv().unwrap(), put(&i.to_string()));
        }

        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_dropped_handle_is_pruned_on_publish() {
        let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
        let handle = broadcaster.subscribe("a");
        drop(handle);

        broadcaster.publish(&["a".into()], put("{}"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
