//! Durable record store.
//!
//! RULE: Only implementations of `RecordStore` talk to storage.
//! The sync layer calls these three operations; nothing else reaches
//! the database or network.
//!
//! The store is an opaque key-value record store keyed by player
//! identity. Calls may fail or be slow; no multi-record transactions are
//! assumed.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SimStore;

use crate::{
    error::PersistenceResult,
    types::{Coins, Identity},
    world::{InventoryItem, Plot},
};
use serde::{Deserialize, Serialize};

/// Who is playing. `identity` keys the durable record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub identity:   Identity,
    pub username:   Option<String>,
    pub first_name: Option<String>,
}

impl PlayerProfile {
    pub fn new(identity: impl Into<Identity>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }
}

/// The full persisted record for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identity:   Identity,
    pub username:   Option<String>,
    pub first_name: Option<String>,
    pub balance:    Coins,
    pub energy:     u32,
    pub max_energy: u32,
    pub inventory:  Vec<InventoryItem>,
    /// Absent in records written before plots were persisted.
    #[serde(default)]
    pub plots:      Option<Vec<Plot>>,
}

/// The mutable part of a record, written by every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub balance:   Coins,
    pub energy:    u32,
    pub inventory: Vec<InventoryItem>,
    pub plots:     Vec<Plot>,
}

/// Calls run inline on the engine's timeline: a save is one discrete step,
/// so a mutation can never land mid-write. Implementations must return
/// promptly (bounded timeouts for remote stores) since every pending step
/// waits on them.
pub trait RecordStore: Send {
    /// `Ok(None)` when no record exists for `identity`.
    fn get_user_record(&mut self, identity: &str) -> PersistenceResult<Option<UserRecord>>;

    fn create_user_record(&mut self, record: &UserRecord) -> PersistenceResult<()>;

    fn update_user_record(&mut self, identity: &str, update: &RecordUpdate) -> PersistenceResult<()>;
}
