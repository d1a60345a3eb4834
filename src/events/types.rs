//! Event types pushed to channel subscribers.

/// Comment text carried by heartbeat markers.
pub const HEARTBEAT_COMMENT: &str = "hb";

/// Kind of a data-carrying event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Full replacement of the channel's dataset.
    Put,
    /// Insert or update of a single flag.
    Patch,
    /// Removal of a single flag at a version.
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Put => "put",
            EventKind::Patch => "patch",
            EventKind::Delete => "delete",
        }
    }
}

/// The unit pushed to a channel.
///
/// `data` holds the already-encoded JSON body so that one event can be
/// handed to many subscribers without re-serializing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEvent {
    Put { data: String },
    Patch { path: String, data: String },
    Delete { path: String, data: String },
    /// Comment-only keep-alive marker. Carries no data.
    Heartbeat,
}

impl RelayEvent {
    /// Event kind, `None` for heartbeats.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            RelayEvent::Put { .. } => Some(EventKind::Put),
            RelayEvent::Patch { .. } => Some(EventKind::Patch),
            RelayEvent::Delete { .. } => Some(EventKind::Delete),
            RelayEvent::Heartbeat => None,
        }
    }

    /// Event name as seen on the wire; empty for heartbeats.
    pub fn event_name(&self) -> &'static str {
        self.kind().map(|kind| kind.as_str()).unwrap_or("")
    }

    /// Addressed path. Empty for `put`, absent for heartbeats.
    pub fn path(&self) -> Option<&str> {
        match self {
            RelayEvent::Put { .. } => Some(""),
            RelayEvent::Patch { path, .. } | RelayEvent::Delete { path, .. } => Some(path),
            RelayEvent::Heartbeat => None,
        }
    }

    /// Encoded JSON body; empty for heartbeats.
    pub fn data(&self) -> &str {
        match self {
            RelayEvent::Put { data }
            | RelayEvent::Patch { data, .. }
            | RelayEvent::Delete { data, .. } => data,
            RelayEvent::Heartbeat => "",
        }
    }

    pub fn comment(&self) -> Option<&'static str> {
        match self {
            RelayEvent::Heartbeat => Some(HEARTBEAT_COMMENT),
            _ => None,
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, RelayEvent::Heartbeat)
    }
}
