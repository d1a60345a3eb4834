//! Subscriber types for the in-process broadcaster.

use crate::events::RelayEvent;
use crate::types::TenantKey;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

/// Configuration shared by all subscribers of a broadcaster.
#[derive(Clone, Debug)]
pub struct BroadcasterConfig {
    /// Max buffered events before dropping a subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// How long a subscriber waits for its bootstrap snapshot before moving
    /// on to live events.
    /// Default: 5s
    pub replay_timeout: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            replay_timeout: Duration::from_secs(5),
        }
    }
}

/// Unique identifier for a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Receiving end of one subscriber.
///
/// Yields the replay snapshot (if any) before anything from the live buffer.
/// Live events published while the snapshot is being built wait in the live
/// buffer, so nothing is lost between the two.
pub struct SubscriberHandle {
    pub id: SubscriberId,
    pub tenant: TenantKey,
    pub(crate) replay: Option<Receiver<RelayEvent>>,
    pub(crate) replay_deadline: Instant,
    pub(crate) live: Receiver<RelayEvent>,
}

impl SubscriberHandle {
    /// Whether the bootstrap stream is still pending.
    pub fn replay_pending(&self) -> bool {
        self.replay.is_some()
    }

    /// Receive the next event (blocking).
    pub fn recv(&mut self) -> Result<RelayEvent, RecvError> {
        if let Some(event) = self.recv_replay(self.replay_deadline) {
            return Ok(event);
        }
        self.live.recv()
    }

    /// Try to receive an event (non-blocking).
    ///
    /// Reports `Empty` while the snapshot is still being produced, even if
    /// live events are buffered.
    pub fn try_recv(&mut self) -> Result<RelayEvent, TryRecvError> {
        if let Some(replay) = &self.replay {
            match replay.try_recv() {
                Ok(event) => {
                    self.replay = None;
                    return Ok(event);
                }
                Err(TryRecvError::Empty) if Instant::now() < self.replay_deadline => {
                    return Err(TryRecvError::Empty);
                }
                Err(TryRecvError::Empty) => self.abandon_replay(),
                Err(TryRecvError::Disconnected) => self.replay = None,
            }
        }
        self.live.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<RelayEvent, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        if self.replay.is_some() {
            if let Some(event) = self.recv_replay(deadline.min(self.replay_deadline)) {
                return Ok(event);
            }
            if self.replay.is_some() {
                // Caller's timeout hit first; the snapshot may still arrive.
                return Err(RecvTimeoutError::Timeout);
            }
        }
        self.live
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
    }

    /// Wait for the snapshot until `deadline`. Clears the replay stream once
    /// it has yielded, closed, or run past the replay timeout.
    fn recv_replay(&mut self, deadline: Instant) -> Option<RelayEvent> {
        let replay = self.replay.as_ref()?;
        match replay.recv_deadline(deadline) {
            Ok(event) => {
                self.replay = None;
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) => {
                if Instant::now() >= self.replay_deadline {
                    self.abandon_replay();
                }
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.replay = None;
                None
            }
        }
    }

    fn abandon_replay(&mut self) {
        tracing::warn!(
            tenant = %self.tenant,
            subscriber = self.id.0,
            "Replay snapshot timed out; continuing with live events"
        );
        self.replay = None;
    }
}
