//! Persistence sync: initial load/merge and debounced write-through.
//!
//! Status machine: Idle → Dirty (mutation) → Scheduled (debounce armed)
//! → Writing → Idle. A failed write drops back to Dirty and waits for the
//! next mutation or an explicit flush. Save failures never touch the
//! world: local state is authoritative.

use crate::{
    config::SimConfig,
    error::{InitializationError, PersistenceResult},
    store::{PlayerProfile, RecordStore, RecordUpdate, UserRecord},
    types::{DurationMs, Timestamp},
    world::{default_plots, UserState, World},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Dirty,
    Scheduled,
    Writing,
}

/// A single cancellable trailing deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceTimer {
    window_ms: DurationMs,
    deadline:  Option<Timestamp>,
}

impl DebounceTimer {
    pub fn new(window_ms: DurationMs) -> Self {
        Self { window_ms, deadline: None }
    }

    /// Cancel any pending deadline and start a fresh window at `now`.
    pub fn arm(&mut self, now: Timestamp) -> Timestamp {
        let deadline = now.saturating_add(self.window_ms);
        self.deadline = Some(deadline);
        deadline
    }

    /// Returns true if a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// Result of resolving the player's durable record at session start.
#[derive(Debug)]
pub struct LoadedSession {
    pub world:      World,
    pub new_record: bool,
}

pub struct PersistenceSync {
    profile:         PlayerProfile,
    store:           Box<dyn RecordStore>,
    status:          SyncStatus,
    debounce:        DebounceTimer,
    saves_completed: u64,
    saves_failed:    u64,
    last_error:      Option<String>,
}

impl PersistenceSync {
    /// Fetch the player's record, or create one with default values.
    ///
    /// Failing to fetch or to create is fatal to starting the session.
    pub fn open(
        profile: PlayerProfile,
        mut store: Box<dyn RecordStore>,
        config: &SimConfig,
        now: Timestamp,
    ) -> Result<(Self, LoadedSession), InitializationError> {
        if profile.identity.trim().is_empty() {
            return Err(InitializationError::MissingIdentity);
        }

        let existing = store
            .get_user_record(&profile.identity)
            .map_err(InitializationError::Fetch)?;

        let loaded = match existing {
            Some(record) => {
                log::info!(
                    "t={now} sync: loaded record for {} (balance={} energy={} items={})",
                    profile.identity,
                    record.balance,
                    record.energy,
                    record.inventory.len()
                );
                let user = UserState {
                    balance:    record.balance,
                    energy:     record.energy,
                    max_energy: record.max_energy,
                };
                LoadedSession {
                    world:      World::hydrate(config, user, record.inventory, record.plots, now),
                    new_record: false,
                }
            }
            None => {
                let e = &config.economy;
                let record = UserRecord {
                    identity:   profile.identity.clone(),
                    username:   profile.username.clone(),
                    first_name: profile.first_name.clone(),
                    balance:    e.initial_balance,
                    energy:     e.initial_energy,
                    max_energy: e.max_energy,
                    inventory:  Vec::new(),
                    plots:      Some(default_plots(e.plot_count, e.unlocked_plots)),
                };
                store
                    .create_user_record(&record)
                    .map_err(InitializationError::Create)?;
                log::info!("t={now} sync: created record for {}", profile.identity);
                LoadedSession {
                    world:      World::fresh(config, now),
                    new_record: true,
                }
            }
        };

        let sync = Self {
            profile,
            store,
            status: SyncStatus::Idle,
            debounce: DebounceTimer::new(config.timing.save_debounce_ms),
            saves_completed: 0,
            saves_failed: 0,
            last_error: None,
        };
        Ok((sync, loaded))
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.debounce.deadline()
    }

    pub fn saves_completed(&self) -> u64 {
        self.saves_completed
    }

    pub fn saves_failed(&self) -> u64 {
        self.saves_failed
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Persisted state changed at `now`: restart the quiet window.
    /// Returns the new deadline.
    pub fn note_mutation(&mut self, now: Timestamp) -> Timestamp {
        self.status = SyncStatus::Dirty;
        let deadline = self.debounce.arm(now);
        self.status = SyncStatus::Scheduled;
        deadline
    }

    /// Write if the debounce deadline has passed. `None` when nothing was due.
    pub fn poll(&mut self, now: Timestamp, world: &World) -> Option<PersistenceResult<()>> {
        if !self.debounce.is_due(now) {
            return None;
        }
        Some(self.write(now, world))
    }

    /// Write any pending change immediately, skipping the quiet window.
    /// Also the explicit retry after a failed save. No-op when Idle.
    pub fn flush(&mut self, now: Timestamp, world: &World) -> PersistenceResult<()> {
        if self.status == SyncStatus::Idle {
            return Ok(());
        }
        self.write(now, world)
    }

    /// Drop the pending deadline without writing.
    pub fn cancel(&mut self) {
        if self.debounce.cancel() && self.status == SyncStatus::Scheduled {
            self.status = SyncStatus::Dirty;
        }
    }

    fn write(&mut self, now: Timestamp, world: &World) -> PersistenceResult<()> {
        self.debounce.cancel();
        self.status = SyncStatus::Writing;

        let update = RecordUpdate {
            balance:   world.user.balance,
            energy:    world.user.energy,
            inventory: world.inventory.clone(),
            plots:     world.plots.clone(),
        };

        match self.store.update_user_record(&self.profile.identity, &update) {
            Ok(()) => {
                self.status = SyncStatus::Idle;
                self.saves_completed += 1;
                self.last_error = None;
                log::info!(
                    "t={now} sync: saved {} (balance={} energy={} items={})",
                    self.profile.identity,
                    update.balance,
                    update.energy,
                    update.inventory.len()
                );
                Ok(())
            }
            Err(e) => {
                self.status = SyncStatus::Dirty;
                self.saves_failed += 1;
                self.last_error = Some(e.to_string());
                log::warn!("t={now} sync: save for {} failed: {e}", self.profile.identity);
                Err(e)
            }
        }
    }
}
