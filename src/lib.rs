//! # Flag Relay
//!
//! A change relay in front of a feature flag store. Every mutation the store
//! accepts is republished as a push event to live subscribers, per tenant,
//! on two channels with different shapes.
//!
//! ## Core Concepts
//!
//! - **Relay**: a [`FeatureStore`] decorator that writes through and relays
//! - **Channels**: `all` (dataset-shaped) and `flags` (flat flag map)
//! - **Replay**: a one-shot snapshot for each newly connected subscriber
//! - **Heartbeat**: payload-less keep-alive markers on a fixed interval
//!
//! ## Example
//!
//! ```ignore
//! use flag_relay::{
//!     Broadcaster, Channel, FeatureStore, Flag, FlagMap, MemoryStore, RelayConfig,
//!     RelayFeatureStore,
//! };
//! use std::sync::Arc;
//!
//! let config = RelayConfig::default();
//! let all = Arc::new(Broadcaster::new(Channel::All, config.broadcaster_config()));
//! let flags = Arc::new(Broadcaster::new(Channel::Flags, config.broadcaster_config()));
//!
//! let relay = RelayFeatureStore::from_config(
//!     "sdk-key",
//!     all.clone(),
//!     flags.clone(),
//!     Arc::new(MemoryStore::new()),
//!     &config,
//! )?;
//!
//! let mut subscriber = flags.subscribe("sdk-key");
//! relay.upsert("beta", Flag::new("beta", 1))?;
//! let patch = subscriber.recv()?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod publisher;
pub mod relay;
pub mod store;
pub mod types;

// Re-exports
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use events::{shaper, EventKind, RelayEvent, HEARTBEAT_COMMENT};
pub use publisher::{
    Broadcaster, BroadcasterConfig, Publisher, ReplayProvider, SubscriberHandle, SubscriberId,
};
pub use relay::{ChannelReplay, Heartbeat, RelayFeatureStore};
pub use store::{FeatureStore, FileStore, FileStoreConfig, FlagTable, MemoryStore};
pub use types::*;
