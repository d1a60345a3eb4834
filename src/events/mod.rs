//! Relay events and the pure functions that shape them per channel.

pub mod shaper;
mod types;

pub use types::{EventKind, RelayEvent, HEARTBEAT_COMMENT};
