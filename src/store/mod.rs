//! The flag store contract and the stores shipped with the relay.
//!
//! The relay only ever talks to a [`FeatureStore`]. Two implementations
//! are provided:
//! - [`MemoryStore`]: version-checked, in-process
//! - [`FileStore`]: the same semantics, persisted to a directory
//!
//! Both reject writes whose version is not newer than what is stored, so the
//! store stays the single ordering authority per key.

mod file;
mod memory;

pub use file::{FileStore, FileStoreConfig};
pub use memory::{FlagTable, MemoryStore};

use crate::error::Result;
use crate::types::{Flag, FlagMap};

/// Operations the relay needs from a flag store.
///
/// A successful `upsert`/`delete` must be visible to the next `get`/`all`
/// from the same process.
pub trait FeatureStore: Send + Sync {
    /// Look up a live flag. Deleted flags read as `None`.
    fn get(&self, key: &str) -> Result<Option<Flag>>;

    /// All live flags.
    fn all(&self) -> Result<FlagMap>;

    /// Replace the whole dataset and mark the store initialized.
    fn init(&self, flags: FlagMap) -> Result<()>;

    /// Insert or update `key`. Older versions are rejected or ignored.
    fn upsert(&self, key: &str, flag: Flag) -> Result<()>;

    /// Delete `key` at `version`. Older versions are rejected or ignored.
    fn delete(&self, key: &str, version: u64) -> Result<()>;

    /// Whether `init` has ever succeeded.
    fn initialized(&self) -> bool;
}
