//! File-backed flag store.
//!
//! Layout of `<path>/flags.bin`:
//!
//! ```text
//! [magic: 4][format: 1][len: u32 LE][MessagePack body: len][crc32: u32 LE]
//! ```
//!
//! Every mutation rewrites the file through `flags.bin.tmp` and a rename, and
//! is committed in memory only once the rename succeeded.

use crate::error::{RelayError, Result};
use crate::types::{Flag, FlagMap};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::memory::{FlagTable, StoredTable};
use super::FeatureStore;

/// Magic bytes for the flag snapshot file.
const FLAGS_MAGIC: &[u8; 4] = b"FRS\0";

/// Current snapshot format version.
const FLAGS_FORMAT: u8 = 1;

const FLAGS_FILE: &str = "flags.bin";
const FLAGS_TMP_FILE: &str = "flags.bin.tmp";
const LOCK_FILE: &str = "LOCK";

/// Upper bound on the encoded body, checked before allocating for it.
const MAX_SNAPSHOT_LEN: usize = 100 * 1024 * 1024;

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding the snapshot and lock file.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./flags"),
            create_if_missing: true,
        }
    }
}

/// [`FeatureStore`] persisted to a directory, one process at a time.
pub struct FileStore {
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    table: RwLock<FlagTable>,

    /// Serializes read-modify-write of the snapshot file.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(config: FileStoreConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(RelayError::NotInitialized);
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;

        let snapshot = config.path.join(FLAGS_FILE);
        let table = if snapshot.exists() {
            Self::load(&snapshot)?
        } else {
            FlagTable::new()
        };

        Ok(Self {
            path: config.path,
            _lock_file: lock_file,
            table: RwLock::new(table),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `op` to a copy of the table, persist it, then commit.
    fn mutate<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut FlagTable) -> Result<()>,
    {
        let _lock = self.write_lock.lock();

        let mut next = self.table.read().clone();
        op(&mut next)?;
        self.save(&next)?;

        *self.table.write() = next;
        Ok(())
    }

    fn save(&self, table: &FlagTable) -> Result<()> {
        let encoded = rmp_serde::to_vec(&StoredTable::from(table))?;
        let checksum = crc32fast::hash(&encoded);

        let tmp_path = self.path.join(FLAGS_TMP_FILE);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;

            file.write_all(FLAGS_MAGIC)?;
            file.write_all(&[FLAGS_FORMAT])?;
            file.write_all(&(encoded.len() as u32).to_le_bytes())?;
            file.write_all(&encoded)?;
            file.write_all(&checksum.to_le_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, self.path.join(FLAGS_FILE))?;
        Ok(())
    }

    fn load(path: &Path) -> Result<FlagTable> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != FLAGS_MAGIC {
            return Err(RelayError::InvalidFormat("Invalid flag snapshot magic".into()));
        }

        let mut format = [0u8; 1];
        file.read_exact(&mut format)?;
        if format[0] != FLAGS_FORMAT {
            return Err(RelayError::InvalidFormat(format!(
                "Unsupported flag snapshot format: {}",
                format[0]
            )));
        }

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_SNAPSHOT_LEN {
            return Err(RelayError::Corruption(format!(
                "Flag snapshot length {} exceeds limit",
                len
            )));
        }

        let mut encoded = vec![0u8; len];
        file.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        if u32::from_le_bytes(checksum_bytes) != crc32fast::hash(&encoded) {
            return Err(RelayError::Corruption("Flag snapshot checksum mismatch".into()));
        }

        let stored: StoredTable = rmp_serde::from_slice(&encoded)?;
        Ok(FlagTable::from(stored))
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| RelayError::Locked)?;

        Ok(lock_file)
    }
}

impl FeatureStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Flag>> {
        Ok(self.table.read().get(key).cloned())
    }

    fn all(&self) -> Result<FlagMap> {
        Ok(self.table.read().live())
    }

    fn init(&self, flags: FlagMap) -> Result<()> {
        self.mutate(|table| table.init(flags))
    }

    fn upsert(&self, key: &str, flag: Flag) -> Result<()> {
        self.mutate(|table| table.upsert(key, flag))
    }

    fn delete(&self, key: &str, version: u64) -> Result<()> {
        self.mutate(|table| table.delete(key, version))
    }

    fn initialized(&self) -> bool {
        self.table.read().is_initialized()
    }
}
