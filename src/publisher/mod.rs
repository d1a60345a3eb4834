//! Channel publishers: fan-out of relay events to subscribers.
//!
//! A [`Publisher`] serves one channel for every tenant. Tenants register a
//! [`ReplayProvider`] so that a subscriber connecting later gets a snapshot
//! before live events.
//!
//! [`Broadcaster`] is the in-process implementation: each subscriber owns a
//! bounded buffer, and a subscriber that falls behind is dropped rather than
//! slowing down the publisher.
//!
//! # Example
//!
//! ```ignore
//! let broadcaster = Broadcaster::new(Channel::Flags, BroadcasterConfig::default());
//! let mut handle = broadcaster.subscribe("sdk-key");
//!
//! loop {
//!     match handle.recv() {
//!         Ok(event) if event.is_heartbeat() => continue,
//!         Ok(event) => println!("{}: {}", event.event_name(), event.data()),
//!         Err(_) => break,
//!     }
//! }
//! ```

mod broadcaster;
mod types;

pub use broadcaster::Broadcaster;
pub use types::{BroadcasterConfig, SubscriberHandle, SubscriberId};

use crate::events::RelayEvent;
use crate::types::TenantKey;
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Produces the bootstrap snapshot for a newly connected subscriber.
pub trait ReplayProvider: Send + Sync {
    /// Start producing at most one event. The returned stream closes once
    /// the provider is done, whether or not an event was sent.
    fn replay(&self) -> Receiver<RelayEvent>;
}

/// One channel's fan-out mechanism, shared across tenants.
pub trait Publisher: Send + Sync {
    /// Use `provider` to bootstrap subscribers of `tenant`.
    fn register(&self, tenant: TenantKey, provider: Arc<dyn ReplayProvider>);

    /// Stop bootstrapping new subscribers of `tenant`. Live events and
    /// existing subscribers are unaffected.
    fn unregister(&self, tenant: &TenantKey);

    /// Hand `event` to every subscriber of any of `tenants`. Never blocks.
    fn publish(&self, tenants: &[TenantKey], event: RelayEvent);
}
