//! In-process record store with failure injection.
//!
//! Clones share the same backing map, so a test can hand one clone to
//! the engine and keep another to inspect calls and inject faults.

use super::{RecordStore, RecordUpdate, UserRecord};
use crate::error::{PersistenceError, PersistenceResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    records:       HashMap<String, UserRecord>,
    get_calls:     u64,
    create_calls:  u64,
    update_calls:  u64,
    fail_gets:     u32,
    fail_creates:  u32,
    fail_updates:  u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked holder cannot leave the map half-written; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a record directly, bypassing call counters.
    pub fn insert(&self, record: UserRecord) {
        self.lock().records.insert(record.identity.clone(), record);
    }

    pub fn record(&self, identity: &str) -> Option<UserRecord> {
        self.lock().records.get(identity).cloned()
    }

    pub fn get_calls(&self) -> u64 {
        self.lock().get_calls
    }

    pub fn create_calls(&self) -> u64 {
        self.lock().create_calls
    }

    pub fn update_calls(&self) -> u64 {
        self.lock().update_calls
    }

    /// The next `n` fetches fail as if the network were down.
    pub fn fail_next_gets(&self, n: u32) {
        self.lock().fail_gets = n;
    }

    pub fn fail_next_creates(&self, n: u32) {
        self.lock().fail_creates = n;
    }

    pub fn fail_next_updates(&self, n: u32) {
        self.lock().fail_updates = n;
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl RecordStore for MemoryStore {
    fn get_user_record(&mut self, identity: &str) -> PersistenceResult<Option<UserRecord>> {
        let mut inner = self.lock();
        inner.get_calls += 1;
        if take_failure(&mut inner.fail_gets) {
            return Err(PersistenceError::Unavailable("injected fetch failure".into()));
        }
        Ok(inner.records.get(identity).cloned())
    }

    fn create_user_record(&mut self, record: &UserRecord) -> PersistenceResult<()> {
        let mut inner = self.lock();
        inner.create_calls += 1;
        if take_failure(&mut inner.fail_creates) {
            return Err(PersistenceError::Unavailable("injected create failure".into()));
        }
        if inner.records.contains_key(&record.identity) {
            return Err(PersistenceError::Rejected(format!(
                "record for '{}' already exists",
                record.identity
            )));
        }
        inner.records.insert(record.identity.clone(), record.clone());
        Ok(())
    }

    fn update_user_record(&mut self, identity: &str, update: &RecordUpdate) -> PersistenceResult<()> {
        let mut inner = self.lock();
        inner.update_calls += 1;
        if take_failure(&mut inner.fail_updates) {
            return Err(PersistenceError::Unavailable("injected update failure".into()));
        }
        let record = inner
            .records
            .get_mut(identity)
            .ok_or_else(|| PersistenceError::Rejected(format!("no record for identity '{identity}'")))?;
        record.balance = update.balance;
        record.energy = update.energy;
        record.inventory = update.inventory.clone();
        record.plots = Some(update.plots.clone());
        Ok(())
    }
}
