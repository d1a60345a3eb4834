//! Channel-specific event shaping.
//!
//! Pure functions mapping a mutation to the event one channel expects. The
//! two channels share mutation semantics but differ in wire shape:
//!
//! | channel | put                          | patch/delete path |
//! |---------|------------------------------|-------------------|
//! | `all`   | `{"flags":{..},"segments":{}}` | `/flags/<key>`    |
//! | `flags` | `{<key>: <flag>, ..}`          | `/<key>`          |

use crate::error::Result;
use crate::types::{AllData, Channel, Flag, FlagMap};
use serde::Serialize;

use super::types::RelayEvent;

const ALL_FLAGS_PREFIX: &str = "/flags/";

#[derive(Serialize)]
struct PatchBody<'a> {
    path: &'a str,
    data: &'a Flag,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    path: &'a str,
    version: u64,
}

/// `put` for the `all` channel.
pub fn all_put(flags: &FlagMap) -> Result<RelayEvent> {
    Ok(RelayEvent::Put {
        data: serde_json::to_string(&AllData::from_flags(flags.clone()))?,
    })
}

/// `put` for the `flags` channel.
pub fn flags_put(flags: &FlagMap) -> Result<RelayEvent> {
    Ok(RelayEvent::Put {
        data: serde_json::to_string(flags)?,
    })
}

pub fn all_patch(flag: &Flag) -> Result<RelayEvent> {
    patch(Channel::All.path_for(&flag.key), flag)
}

pub fn flags_patch(flag: &Flag) -> Result<RelayEvent> {
    patch(Channel::Flags.path_for(&flag.key), flag)
}

pub fn all_delete(key: &str, version: u64) -> Result<RelayEvent> {
    delete(Channel::All.path_for(key), version)
}

pub fn flags_delete(key: &str, version: u64) -> Result<RelayEvent> {
    delete(Channel::Flags.path_for(key), version)
}

pub fn heartbeat() -> RelayEvent {
    RelayEvent::Heartbeat
}

fn patch(path: String, flag: &Flag) -> Result<RelayEvent> {
    let data = serde_json::to_string(&PatchBody {
        path: &path,
        data: flag,
    })?;
    Ok(RelayEvent::Patch { path, data })
}

fn delete(path: String, version: u64) -> Result<RelayEvent> {
    let data = serde_json::to_string(&DeleteBody {
        path: &path,
        version,
    })?;
    Ok(RelayEvent::Delete { path, data })
}

impl Channel {
    /// Path addressing a single flag on this channel.
    pub fn path_for(&self, key: &str) -> String {
        match self {
            Channel::All => format!("{}{}", ALL_FLAGS_PREFIX, key),
            Channel::Flags => format!("/{}", key),
        }
    }

    pub fn put_event(&self, flags: &FlagMap) -> Result<RelayEvent> {
        match self {
            Channel::All => all_put(flags),
            Channel::Flags => flags_put(flags),
        }
    }

    pub fn patch_event(&self, flag: &Flag) -> Result<RelayEvent> {
        match self {
            Channel::All => all_patch(flag),
            Channel::Flags => flags_patch(flag),
        }
    }

    pub fn delete_event(&self, key: &str, version: u64) -> Result<RelayEvent> {
        match self {
            Channel::All => all_delete(key, version),
            Channel::Flags => flags_delete(key, version),
        }
    }
}
