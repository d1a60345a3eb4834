//! In-memory, version-checked flag store.

use crate::error::{RelayError, Result};
use crate::types::{Flag, FlagMap};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::FeatureStore;

/// Flags plus tombstones, with the version rules every store here shares.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlagTable {
    items: FlagMap,
    initialized: bool,
}

impl FlagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Flag> {
        self.items.get(key).filter(|flag| !flag.deleted)
    }

    /// Live flags only.
    pub fn live(&self) -> FlagMap {
        self.items
            .iter()
            .filter(|(_, flag)| !flag.deleted)
            .map(|(key, flag)| (key.clone(), flag.clone()))
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replace everything. Rejected as a whole if any entry is filed under
    /// a key other than its own.
    pub fn init(&mut self, flags: FlagMap) -> Result<()> {
        for (key, flag) in &flags {
            check_key(key, flag)?;
        }
        self.items = flags;
        self.initialized = true;
        Ok(())
    }

    pub fn upsert(&mut self, key: &str, flag: Flag) -> Result<()> {
        check_key(key, &flag)?;
        self.check_version(key, flag.version)?;
        self.items.insert(key.to_string(), flag);
        Ok(())
    }

    pub fn delete(&mut self, key: &str, version: u64) -> Result<()> {
        self.check_version(key, version)?;
        self.items.insert(key.to_string(), Flag::tombstone(key, version));
        Ok(())
    }

    /// Tombstones count: a delete at v3 blocks a late upsert at v2.
    fn check_version(&self, key: &str, version: u64) -> Result<()> {
        match self.items.get(key) {
            Some(current) if current.version >= version => Err(RelayError::StaleVersion {
                key: key.to_string(),
                version,
                current: current.version,
            }),
            _ => Ok(()),
        }
    }
}

fn check_key(key: &str, flag: &Flag) -> Result<()> {
    if flag.key != key {
        return Err(RelayError::KeyMismatch {
            key: key.to_string(),
            flag_key: flag.key.clone(),
        });
    }
    Ok(())
}

/// On-disk form of a table entry.
///
/// Flattened attributes do not survive MessagePack, so they are kept as a
/// nested map.
#[derive(Serialize, Deserialize)]
struct StoredFlag {
    key: String,
    version: u64,
    deleted: bool,
    attributes: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct StoredTable {
    initialized: bool,
    items: Vec<StoredFlag>,
}

impl From<&FlagTable> for StoredTable {
    fn from(table: &FlagTable) -> Self {
        Self {
            initialized: table.initialized,
            items: table
                .items
                .values()
                .map(|flag| StoredFlag {
                    key: flag.key.clone(),
                    version: flag.version,
                    deleted: flag.deleted,
                    attributes: flag.attributes.clone(),
                })
                .collect(),
        }
    }
}

impl From<StoredTable> for FlagTable {
    fn from(stored: StoredTable) -> Self {
        let items = stored
            .items
            .into_iter()
            .map(|item| {
                let flag = Flag {
                    key: item.key.clone(),
                    version: item.version,
                    deleted: item.deleted,
                    attributes: item.attributes,
                };
                (item.key, flag)
            })
            .collect();
        Self {
            items,
            initialized: stored.initialized,
        }
    }
}

/// Thread-safe in-memory [`FeatureStore`].
#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<FlagTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeatureStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Flag>> {
        Ok(self.table.read().get(key).cloned())
    }

    fn all(&self) -> Result<FlagMap> {
        Ok(self.table.read().live())
    }

    fn init(&self, flags: FlagMap) -> Result<()> {
        self.table.write().init(flags)
    }

    fn upsert(&self, key: &str, flag: Flag) -> Result<()> {
        self.table.write().upsert(key, flag)
    }

    fn delete(&self, key: &str, version: u64) -> Result<()> {
        self.table.write().delete(key, version)
    }

    fn initialized(&self) -> bool {
        self.table.read().is_initialized()
    }
}
