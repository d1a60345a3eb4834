//! Relay configuration.

use crate::publisher::BroadcasterConfig;
use serde::Deserialize;
use std::time::Duration;

/// Settings for a relay and the broadcasters it publishes through.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```ignore
/// let config: RelayConfig = serde_json::from_str(r#"{"heartbeat_interval_secs": 0}"#)?;
/// assert!(config.heartbeat_interval().is_none());
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Seconds between heartbeats. Zero or negative disables them.
    /// Default: 180
    pub heartbeat_interval_secs: i64,

    /// Per-subscriber event buffer.
    /// Default: 1000
    pub subscriber_buffer_size: usize,

    /// Longest a subscriber waits for its replay snapshot.
    /// Default: 5000
    pub replay_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 180,
            subscriber_buffer_size: 1000,
            replay_timeout_ms: 5000,
        }
    }
}

impl RelayConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        if self.heartbeat_interval_secs > 0 {
            Some(Duration::from_secs(self.heartbeat_interval_secs as u64))
        } else {
            None
        }
    }

    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            buffer_size: self.subscriber_buffer_size,
            replay_timeout: Duration::from_millis(self.replay_timeout_ms),
        }
    }
}
