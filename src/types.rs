//! Core types for the relay.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A feature flag as held by the store.
///
/// Only `key` and `version` are interpreted. Every other field travels as
/// opaque JSON and is flattened back into the flag when serialized.
/// Attributes named like one of [`RESERVED_FIELDS`] are never emitted.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Flag {
    pub key: String,
    pub version: u64,
    /// Tombstone marker left behind by a delete.
    #[serde(default)]
    pub deleted: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Field names owned by [`Flag`] itself.
pub const RESERVED_FIELDS: [&str; 3] = ["key", "version", "deleted"];

fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

impl Flag {
    pub fn new(key: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
            deleted: false,
            attributes: Map::new(),
        }
    }

    /// Placeholder recording that `key` was deleted at `version`.
    pub fn tombstone(key: impl Into<String>, version: u64) -> Self {
        Self {
            deleted: true,
            ..Self::new(key, version)
        }
    }

    /// Set an opaque attribute (e.g. `on`, `variations`). Reserved names
    /// are ignored.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if !is_reserved(&name) {
            self.attributes.insert(name, value);
        }
        self
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("key", &self.key)?;
        map.serialize_entry("version", &self.version)?;
        if self.deleted {
            map.serialize_entry("deleted", &true)?;
        }
        for (name, value) in &self.attributes {
            if !is_reserved(name) {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

/// Flags keyed by flag key. Ordered so that encoded events are deterministic.
pub type FlagMap = BTreeMap<String, Flag>;

/// The dataset as seen on the `all` channel.
///
/// Segments are never relayed but the map is always present so consumers of
/// the full-dataset format find the key they expect.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AllData {
    pub flags: FlagMap,
    pub segments: BTreeMap<String, Value>,
}

impl AllData {
    pub fn from_flags(flags: FlagMap) -> Self {
        Self {
            flags,
            segments: BTreeMap::new(),
        }
    }
}

/// Credential identifying one isolated subscriber population.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantKey(pub String);

impl TenantKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantKey({})", self.0)
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantKey {
    fn from(key: &str) -> Self {
        TenantKey(key.to_string())
    }
}

impl From<String> for TenantKey {
    fn from(key: String) -> Self {
        TenantKey(key)
    }
}

/// One of the two fixed event projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Dataset-shaped: flags nested under `flags`, plus empty `segments`.
    All,
    /// Flat flag map.
    Flags,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::All => "all",
            Channel::Flags => "flags",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
