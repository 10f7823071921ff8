//! Simulation events: the record of every step the timeline executes.
//!
//! The engine inspects each event to decide whether persisted state
//! changed; that is how the save debounce observes mutations.

use crate::{
    catalog::CropType,
    types::{BuyerId, Coins, Identity, ItemId, PlotId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    // ── Session ────────────────────────────────────
    SessionStarted {
        at:         Timestamp,
        identity:   Option<Identity>,
        new_record: bool,
    },
    SessionClosed {
        at: Timestamp,
    },

    // ── Player actions ─────────────────────────────
    Planted {
        at:          Timestamp,
        plot_id:     PlotId,
        crop:        CropType,
        energy_cost: u32,
        seed_cost:   Coins,
    },
    Harvested {
        at:         Timestamp,
        plot_id:    PlotId,
        item_id:    ItemId,
        crop:       CropType,
        quantity:   u32,
        expires_at: Timestamp,
    },
    Sold {
        at:         Timestamp,
        buyer_id:   BuyerId,
        crop:       CropType,
        item_ids:   Vec<ItemId>,
        unit_price: Coins,
        total:      Coins,
    },
    ActionRejected {
        at:     Timestamp,
        action: String,
        reason: String,
    },

    // ── Periodic steps ─────────────────────────────
    EnergyRegenerated {
        at:     Timestamp,
        energy: u32,
    },
    ItemsExpired {
        at:       Timestamp,
        item_ids: Vec<ItemId>,
    },
    MarketUpdated {
        at:    Timestamp,
        trend: BTreeMap<CropType, f64>,
    },

    // ── Persistence ────────────────────────────────
    SaveScheduled {
        at:       Timestamp,
        deadline: Timestamp,
    },
    SaveCompleted {
        at: Timestamp,
    },
    SaveFailed {
        at:     Timestamp,
        reason: String,
    },
}

impl SimEvent {
    /// True when the event changed balance, energy, inventory or plots,
    /// i.e. anything that belongs in the persisted record.
    pub fn touches_persisted_state(&self) -> bool {
        matches!(
            self,
            SimEvent::Planted { .. }
                | SimEvent::Harvested { .. }
                | SimEvent::Sold { .. }
                | SimEvent::EnergyRegenerated { .. }
                | SimEvent::ItemsExpired { .. }
        )
    }

    pub fn at(&self) -> Timestamp {
        match self {
            SimEvent::SessionStarted { at, .. }
            | SimEvent::SessionClosed { at }
            | SimEvent::Planted { at, .. }
            | SimEvent::Harvested { at, .. }
            | SimEvent::Sold { at, .. }
            | SimEvent::ActionRejected { at, .. }
            | SimEvent::EnergyRegenerated { at, .. }
            | SimEvent::ItemsExpired { at, .. }
            | SimEvent::MarketUpdated { at, .. }
            | SimEvent::SaveScheduled { at, .. }
            | SimEvent::SaveCompleted { at }
            | SimEvent::SaveFailed { at, .. } => *at,
        }
    }
}

/// Extract a stable string name from a SimEvent variant.
pub fn event_type_name(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::SessionStarted { .. }    => "session_started",
        SimEvent::SessionClosed { .. }     => "session_closed",
        SimEvent::Planted { .. }           => "planted",
        SimEvent::Harvested { .. }         => "harvested",
        SimEvent::Sold { .. }              => "sold",
        SimEvent::ActionRejected { .. }    => "action_rejected",
        SimEvent::EnergyRegenerated { .. } => "energy_regenerated",
        SimEvent::ItemsExpired { .. }      => "items_expired",
        SimEvent::MarketUpdated { .. }     => "market_updated",
        SimEvent::SaveScheduled { .. }     => "save_scheduled",
        SimEvent::SaveCompleted { .. }     => "save_completed",
        SimEvent::SaveFailed { .. }        => "save_failed",
    }
}

/// One entry in the engine's in-memory event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub seq:        u64,
    pub at:         Timestamp,
    pub subsystem:  String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized SimEvent
}
