//! The relay: a [`FeatureStore`] that republishes its own mutations.
//!
//! [`RelayFeatureStore`] wraps the real store and is used in its place.
//! Reads pass straight through. Writes go to the store first, and only a
//! write the store accepted is turned into one event per channel:
//!
//! | mutation | `all` channel                 | `flags` channel   |
//! |----------|-------------------------------|-------------------|
//! | init     | put `{flags, segments}`       | put `{key: flag}` |
//! | upsert   | patch `/flags/<key>`          | patch `/<key>`    |
//! | delete   | delete `/flags/<key>`         | delete `/<key>`   |
//!
//! Each relay serves exactly one tenant key, registers a [`ChannelReplay`]
//! with both publishers and optionally runs a [`Heartbeat`].

mod heartbeat;
mod replay;

pub use heartbeat::Heartbeat;
pub use replay::ChannelReplay;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::events::RelayEvent;
use crate::publisher::Publisher;
use crate::store::FeatureStore;
use crate::types::{Channel, Flag, FlagMap, TenantKey};
use parking_lot::Mutex;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store decorator relaying mutations to the `all` and `flags` channels.
pub struct RelayFeatureStore {
    tenant: TenantKey,
    store: Arc<dyn FeatureStore>,
    all_publisher: Arc<dyn Publisher>,
    flags_publisher: Arc<dyn Publisher>,
    heartbeat: Mutex<Option<Heartbeat>>,
    shut_down: AtomicBool,
}

impl RelayFeatureStore {
    /// Wire a relay for `tenant`.
    ///
    /// Registers replay providers with both publishers and, when
    /// `heartbeat_interval` is a non-zero duration, starts heartbeats (the
    /// first one is published before this returns or shortly after).
    pub fn new(
        tenant: impl Into<TenantKey>,
        all_publisher: Arc<dyn Publisher>,
        flags_publisher: Arc<dyn Publisher>,
        store: Arc<dyn FeatureStore>,
        heartbeat_interval: Option<Duration>,
    ) -> Result<Self> {
        let tenant = tenant.into();

        all_publisher.register(
            tenant.clone(),
            Arc::new(ChannelReplay::new(tenant.clone(), Channel::All, Arc::clone(&store))),
        );
        flags_publisher.register(
            tenant.clone(),
            Arc::new(ChannelReplay::new(tenant.clone(), Channel::Flags, Arc::clone(&store))),
        );

        let heartbeat = match heartbeat_interval.filter(|interval| !interval.is_zero()) {
            Some(interval) => Some(Heartbeat::start(
                tenant.clone(),
                vec![Arc::clone(&all_publisher), Arc::clone(&flags_publisher)],
                interval,
            )?),
            None => None,
        };

        tracing::debug!(
            tenant = %tenant,
            heartbeat = heartbeat.is_some(),
            "Relay created"
        );

        Ok(Self {
            tenant,
            store,
            all_publisher,
            flags_publisher,
            heartbeat: Mutex::new(heartbeat),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Like [`RelayFeatureStore::new`], taking the heartbeat from `config`.
    pub fn from_config(
        tenant: impl Into<TenantKey>,
        all_publisher: Arc<dyn Publisher>,
        flags_publisher: Arc<dyn Publisher>,
        store: Arc<dyn FeatureStore>,
        config: &RelayConfig,
    ) -> Result<Self> {
        Self::new(
            tenant,
            all_publisher,
            flags_publisher,
            store,
            config.heartbeat_interval(),
        )
    }

    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat
            .lock()
            .as_ref()
            .map(Heartbeat::is_running)
            .unwrap_or(false)
    }

    /// Stop heartbeats and withdraw the replay providers, so later
    /// subscribers of this tenant get no snapshot from this relay.
    /// Mutations keep working. Idempotent.
    pub fn shutdown(&self) {
        // Take first so the join happens without holding the lock.
        let heartbeat = self.heartbeat.lock().take();
        if let Some(mut heartbeat) = heartbeat {
            heartbeat.stop();
        }
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            self.all_publisher.unregister(&self.tenant);
            self.flags_publisher.unregister(&self.tenant);
            tracing::debug!(tenant = %self.tenant, "Relay shut down");
        }
    }

    /// Build and publish one event per channel.
    ///
    /// An event that fails to encode is logged and skipped; the store write
    /// already happened, so the caller still sees success.
    fn publish<F>(&self, mutation: &'static str, build: F)
    where
        F: Fn(Channel) -> Result<RelayEvent>,
    {
        let targets = [
            (Channel::All, &self.all_publisher),
            (Channel::Flags, &self.flags_publisher),
        ];

        for (channel, publisher) in targets {
            match build(channel) {
                Ok(event) => publisher.publish(slice::from_ref(&self.tenant), event),
                Err(e) => tracing::error!(
                    tenant = %self.tenant,
                    channel = %channel,
                    mutation,
                    error = %e,
                    "Dropping event that failed to encode"
                ),
            }
        }
    }
}

impl FeatureStore for RelayFeatureStore {
    fn get(&self, key: &str) -> Result<Option<Flag>> {
        self.store.get(key)
    }

    fn all(&self) -> Result<FlagMap> {
        self.store.all()
    }

    fn init(&self, flags: FlagMap) -> Result<()> {
        self.store.init(flags.clone())?;

        tracing::debug!(tenant = %self.tenant, flags = flags.len(), "Relaying init");
        self.publish("init", |channel| channel.put_event(&flags));
        Ok(())
    }

    /// Relays what the store holds after the write, which may differ from
    /// `flag` if the store resolved a conflict. Nothing is relayed when the
    /// key reads back as absent.
    fn upsert(&self, key: &str, flag: Flag) -> Result<()> {
        self.store.upsert(key, flag)?;

        let Some(current) = self.store.get(key)? else {
            tracing::debug!(tenant = %self.tenant, key, "Upserted flag no longer present");
            return Ok(());
        };

        tracing::debug!(
            tenant = %self.tenant,
            key,
            version = current.version,
            "Relaying upsert"
        );
        self.publish("upsert", |channel| channel.patch_event(&current));
        Ok(())
    }

    fn delete(&self, key: &str, version: u64) -> Result<()> {
        self.store.delete(key, version)?;

        tracing::debug!(tenant = %self.tenant, key, version, "Relaying delete");
        self.publish("delete", |channel| channel.delete_event(key, version));
        Ok(())
    }

    fn initialized(&self) -> bool {
        self.store.initialized()
    }
}

impl Drop for RelayFeatureStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::publisher::ReplayProvider;
    use crate::store::MemoryStore;

    /// Records what was published and registered.
    #[derive(Default)]
    struct Recorder {
        published: Mutex<Vec<(Vec<TenantKey>, RelayEvent)>>,
        registered: Mutex<Vec<TenantKey>>,
        unregistered: Mutex<Vec<TenantKey>>,
    }

    impl Publisher for Recorder {
        fn register(&self, tenant: TenantKey, _provider: Arc<dyn ReplayProvider>) {
            self.registered.lock().push(tenant);
        }

        fn unregister(&self, tenant: &TenantKey) {
            self.unregistered.lock().push(tenant.clone());
        }

        fn publish(&self, tenants: &[TenantKey], event: RelayEvent) {
            self.published.lock().push((tenants.to_vec(), event));
        }
    }

    fn relay() -> (RelayFeatureStore, Arc<Recorder>, Arc<Recorder>) {
        let all = Arc::new(Recorder::default());
        let flags = Arc::new(Recorder::default());
        let relay = RelayFeatureStore::new(
            "sdk-key",
            all.clone(),
            flags.clone(),
            Arc::new(MemoryStore::new()),
            None,
        )
        .unwrap();
        (relay, all, flags)
    }

    #[test]
    fn test_registers_with_both_publishers() {
        let (_relay, all, flags) = relay();

        assert_eq!(*all.registered.lock(), vec![TenantKey::from("sdk-key")]);
        assert_eq!(*flags.registered.lock(), vec![TenantKey::from("sdk-key")]);
    }

    #[test]
    fn test_reads_publish_nothing() {
        let (relay, all, flags) = relay();
        relay.init(FlagMap::new()).unwrap();
        all.published.lock().clear();
        flags.published.lock().clear();

        relay.get("beta").unwrap();
        relay.all().unwrap();
        assert!(relay.initialized());

        assert!(all.published.lock().is_empty());
        assert!(flags.published.lock().is_empty());
    }

    #[test]
    fn test_publishes_to_own_tenant_only() {
        let (relay, all, _flags) = relay();
        relay.init(FlagMap::new()).unwrap();
        relay.upsert("beta", Flag::new("beta", 1)).unwrap();

        for (tenants, _) in all.published.lock().iter() {
            assert_eq!(tenants, &vec![TenantKey::from("sdk-key")]);
        }
    }

    #[test]
    fn test_rejected_write_publishes_nothing() {
        let (relay, all, flags) = relay();
        relay.upsert("beta", Flag::new("beta", 2)).unwrap();
        all.published.lock().clear();
        flags.published.lock().clear();

        let result = relay.upsert("beta", Flag::new("beta", 1));

        assert!(matches!(result, Err(RelayError::StaleVersion { .. })));
        assert!(all.published.lock().is_empty());
        assert!(flags.published.lock().is_empty());
    }

    #[test]
    fn test_upsert_under_foreign_key_publishes_nothing() {
        let (relay, all, flags) = relay();
        relay.init(FlagMap::new()).unwrap();
        all.published.lock().clear();
        flags.published.lock().clear();

        let result = relay.upsert("beta", Flag::new("alpha", 5));

        assert!(matches!(result, Err(RelayError::KeyMismatch { .. })));
        assert!(relay.all().unwrap().is_empty());
        assert!(all.published.lock().is_empty());
        assert!(flags.published.lock().is_empty());
    }

    #[test]
    fn test_shutdown_unregisters_once() {
        let (relay, all, flags) = relay();
        relay.shutdown();
        relay.shutdown();
        drop(relay);

        assert_eq!(*all.unregistered.lock(), vec![TenantKey::from("sdk-key")]);
        assert_eq!(*flags.unregistered.lock(), vec![TenantKey::from("sdk-key")]);
    }

    #[test]
    fn test_no_heartbeat_without_interval() {
        let (relay, _all, _flags) = relay();
        assert!(!relay.heartbeat_running());

        let zero = RelayFeatureStore::new(
            "other",
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
            Arc::new(MemoryStore::new()),
            Some(Duration::ZERO),
        )
        .unwrap();
        assert!(!zero.heartbeat_running());
    }

    #[test]
    fn test_shutdown_stops_heartbeat() {
        let relay = RelayFeatureStore::new(
            "sdk-key",
            Arc::new(Recorder::default()),
            Arc::new(Recorder::default()),
            Arc::new(MemoryStore::new()),
            Some(Duration::from_secs(60)),
        )
        .unwrap();
        assert!(relay.heartbeat_running());

        relay.shutdown();
        assert!(!relay.heartbeat_running());
        relay.shutdown();
    }
}
