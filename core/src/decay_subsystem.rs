//! Inventory decay: removes spoiled goods.
//!
//! A pure filter over the inventory: never touches plots, balance or
//! energy. Removal is irreversible and credits nothing.

use crate::{
    event::SimEvent,
    subsystem::SimSubsystem,
    types::{DurationMs, Timestamp},
    world::{InventoryItem, World},
};

/// Partition the inventory at `now`, keeping live items in their original
/// order. Returns the removed items.
pub fn sweep(world: &mut World, now: Timestamp) -> Vec<InventoryItem> {
    let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut world.inventory)
        .into_iter()
        .partition(|item| item.is_expired(now));
    world.inventory = live;
    for item in &expired {
        world.ledger.record_expiry(item.crop, item.quantity);
    }
    expired
}

pub struct DecaySubsystem {
    period_ms: DurationMs,
}

impl DecaySubsystem {
    pub fn new(period_ms: DurationMs) -> Self {
        Self { period_ms }
    }
}

impl SimSubsystem for DecaySubsystem {
    fn name(&self) -> &'static str { "decay" }

    fn period_ms(&self) -> DurationMs { self.period_ms }

    fn update(&mut self, now: Timestamp, world: &mut World) -> Vec<SimEvent> {
        let expired = sweep(world, now);
        if expired.is_empty() {
            return vec![];
        }

        log::info!(
            "t={now} decay: {} item(s) spoiled, {} left",
            expired.len(),
            world.inventory.len()
        );

        vec![SimEvent::ItemsExpired {
            at:       now,
            item_ids: expired.into_iter().map(|i| i.id).collect(),
        }]
    }
}
