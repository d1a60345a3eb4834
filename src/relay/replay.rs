//! Bootstrap snapshots for newly connected subscribers.

use crate::events::RelayEvent;
use crate::publisher::ReplayProvider;
use crate::store::FeatureStore;
use crate::types::{Channel, TenantKey};
use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use std::thread;

/// Replays the current dataset of one tenant, shaped for one channel.
pub struct ChannelReplay {
    tenant: TenantKey,
    channel: Channel,
    store: Arc<dyn FeatureStore>,
}

impl ChannelReplay {
    pub fn new(tenant: TenantKey, channel: Channel, store: Arc<dyn FeatureStore>) -> Self {
        Self {
            tenant,
            channel,
            store,
        }
    }

    /// The `put` event for the current dataset.
    ///
    /// `None` when the store was never initialized, or when the read or the
    /// encoding fails. A subscriber without a snapshot stays connected and
    /// picks up live events.
    pub fn snapshot(&self) -> Option<RelayEvent> {
        if !self.store.initialized() {
            return None;
        }

        let flags = match self.store.all() {
            Ok(flags) => flags,
            Err(e) => {
                tracing::error!(
                    tenant = %self.tenant,
                    channel = %self.channel,
                    error = %e,
                    "Error getting all flags for replay"
                );
                return None;
            }
        };

        match self.channel.put_event(&flags) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::error!(
                    tenant = %self.tenant,
                    channel = %self.channel,
                    error = %e,
                    "Error encoding replay snapshot"
                );
                None
            }
        }
    }
}

impl ReplayProvider for ChannelReplay {
    fn replay(&self) -> Receiver<RelayEvent> {
        let (tx, rx) = bounded(1);
        let provider = ChannelReplay::new(
            self.tenant.clone(),
            self.channel,
            Arc::clone(&self.store),
        );

        let spawned = thread::Builder::new()
            .name(format!("replay-{}", self.channel))
            .spawn(move || {
                if let Some(event) = provider.snapshot() {
                    // Receiver may be gone if the subscriber left already.
                    let _ = tx.send(event);
                }
            });

        // On spawn failure the sender was dropped with the closure, which
        // closes the stream empty.
        if let Err(e) = spawned {
            tracing::error!(
                tenant = %self.tenant,
                channel = %self.channel,
                error = %e,
                "Failed to spawn replay thread"
            );
        }

        rx
    }
}
