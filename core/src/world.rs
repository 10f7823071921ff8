//! The world aggregate: the single owned value every step mutates.
//!
//! RULE: Only the engine holds a `World`. Periodic steps and player
//! actions receive `&mut World` one at a time; the presentation layer
//! only ever sees a snapshot.

use crate::{
    catalog::CropType,
    config::SimConfig,
    types::{Coins, ItemId, PlotId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub balance:    Coins,
    pub energy:     u32,
    pub max_energy: u32,
}

/// A crop in the ground. Present iff the plot is planted, which keeps
/// "crop set iff planted_at set" true by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planting {
    pub crop:       CropType,
    pub planted_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    pub id:       PlotId,
    pub unlocked: bool,
    #[serde(default)]
    pub planting: Option<Planting>,
}

impl Plot {
    pub fn crop(&self) -> Option<CropType> {
        self.planting.map(|p| p.crop)
    }

    pub fn planted_at(&self) -> Option<Timestamp> {
        self.planting.map(|p| p.planted_at)
    }
}

/// The default plot layout: `plot-0..plot-{n}`, the first few unlocked.
pub fn default_plots(plot_count: usize, unlocked: usize) -> Vec<Plot> {
    (0..plot_count)
        .map(|i| Plot {
            id:       format!("plot-{i}"),
            unlocked: i < unlocked,
            planting: None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id:           ItemId,
    pub crop:         CropType,
    pub quantity:     u32,
    pub harvested_at: Timestamp,
    pub expires_at:   Timestamp,
}

impl InventoryItem {
    /// Inclusive: an item exactly at its expiry instant is spoiled.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub trend:        BTreeMap<CropType, f64>,
    pub last_updated: Timestamp,
}

impl MarketState {
    /// Flat market: every trend at 1.0.
    pub fn flat(now: Timestamp) -> Self {
        Self {
            trend:        CropType::ALL.into_iter().map(|c| (c, 1.0)).collect(),
            last_updated: now,
        }
    }

    pub fn trend_for(&self, crop: CropType) -> f64 {
        self.trend.get(&crop).copied().unwrap_or(1.0)
    }
}

/// Per-crop quantity counters backing the conservation check:
/// `held == opening + harvested - expired - sold`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProduceLedger {
    /// Quantity already in inventory when the session was hydrated.
    pub opening:   BTreeMap<CropType, u64>,
    pub harvested: BTreeMap<CropType, u64>,
    pub expired:   BTreeMap<CropType, u64>,
    pub sold:      BTreeMap<CropType, u64>,
}

impl ProduceLedger {
    fn opened_with(inventory: &[InventoryItem]) -> Self {
        let mut ledger = Self::default();
        for item in inventory {
            *ledger.opening.entry(item.crop).or_default() += u64::from(item.quantity);
        }
        ledger
    }

    pub fn record_harvest(&mut self, crop: CropType, quantity: u32) {
        *self.harvested.entry(crop).or_default() += u64::from(quantity);
    }

    pub fn record_expiry(&mut self, crop: CropType, quantity: u32) {
        *self.expired.entry(crop).or_default() += u64::from(quantity);
    }

    pub fn record_sale(&mut self, crop: CropType, quantity: u32) {
        *self.sold.entry(crop).or_default() += u64::from(quantity);
    }

    /// Quantity that should currently be held, or `None` if the counters
    /// say more left than ever entered.
    pub fn expected_held(&self, crop: CropType) -> Option<u64> {
        let get = |m: &BTreeMap<CropType, u64>| m.get(&crop).copied().unwrap_or(0);
        (get(&self.opening) + get(&self.harvested))
            .checked_sub(get(&self.expired))?
            .checked_sub(get(&self.sold))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub user:      UserState,
    pub plots:     Vec<Plot>,
    pub inventory: Vec<InventoryItem>,
    pub market:    MarketState,
    pub ledger:    ProduceLedger,
}

/// Repair a stored inventory: items with zero quantity are dropped and
/// repeated ids are renamed `<id>-<n>`, so every held item is unique and
/// holds at least one unit.
pub fn sanitize_inventory(inventory: Vec<InventoryItem>) -> Vec<InventoryItem> {
    let stored: HashSet<ItemId> = inventory.iter().map(|i| i.id.clone()).collect();
    let mut seen: HashSet<ItemId> = HashSet::with_capacity(inventory.len());
    let mut kept = Vec::with_capacity(inventory.len());
    for mut item in inventory {
        if item.quantity == 0 {
            log::warn!("hydrate: dropping empty stored item {}", item.id);
            continue;
        }
        if seen.contains(&item.id) {
            let original = item.id.clone();
            let mut n = 1;
            let mut candidate = format!("{original}-{n}");
            while seen.contains(&candidate) || stored.contains(&candidate) {
                n += 1;
                candidate = format!("{original}-{n}");
            }
            item.id = candidate;
            log::warn!("hydrate: duplicate stored item {original} renamed to {}", item.id);
        }
        seen.insert(item.id.clone());
        kept.push(item);
    }
    kept
}

impl World {
    /// A brand new player: default balance/energy, default plot layout.
    pub fn fresh(config: &SimConfig, now: Timestamp) -> Self {
        let e = &config.economy;
        Self {
            user: UserState {
                balance:    e.initial_balance,
                energy:     e.initial_energy,
                max_energy: e.max_energy,
            },
            plots:     default_plots(e.plot_count, e.unlocked_plots),
            inventory: Vec::new(),
            market:    MarketState::flat(now),
            ledger:    ProduceLedger::default(),
        }
    }

    /// Rebuild from persisted parts. Records without plots get the
    /// default layout; the inventory is passed through `sanitize_inventory`.
    pub fn hydrate(
        config: &SimConfig,
        user: UserState,
        inventory: Vec<InventoryItem>,
        plots: Option<Vec<Plot>>,
        now: Timestamp,
    ) -> Self {
        let e = &config.economy;
        let user = UserState {
            energy: user.energy.min(user.max_energy),
            ..user
        };
        let inventory = sanitize_inventory(inventory);
        Self {
            ledger:    ProduceLedger::opened_with(&inventory),
            user,
            plots:     plots.unwrap_or_else(|| default_plots(e.plot_count, e.unlocked_plots)),
            inventory,
            market:    MarketState::flat(now),
        }
    }

    pub fn plot(&self, plot_id: &str) -> Option<&Plot> {
        self.plots.iter().find(|p| p.id == plot_id)
    }

    pub fn plot_mut(&mut self, plot_id: &str) -> Option<&mut Plot> {
        self.plots.iter_mut().find(|p| p.id == plot_id)
    }

    pub fn item(&self, item_id: &str) -> Option<&InventoryItem> {
        self.inventory.iter().find(|i| i.id == item_id)
    }

    pub fn held_quantity(&self, crop: CropType) -> u64 {
        self.inventory
            .iter()
            .filter(|i| i.crop == crop)
            .map(|i| u64::from(i.quantity))
            .sum()
    }

    /// No quantity created or destroyed outside harvest, expiry and sale.
    pub fn conservation_holds(&self) -> bool {
        CropType::ALL
            .into_iter()
            .all(|c| self.ledger.expected_held(c) == Some(self.held_quantity(c)))
    }
}
