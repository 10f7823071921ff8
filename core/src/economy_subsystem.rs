//! Resource economy: passive energy regeneration and sales.
//!
//! Currency and energy never go negative: spending that would overdraw
//! is rejected, never clamped. The only clamp is regeneration stopping
//! at the energy ceiling.

use crate::{
    catalog::CropType,
    config::SimConfig,
    error::{ActionError, ActionResult},
    event::SimEvent,
    market_subsystem::price,
    subsystem::SimSubsystem,
    types::{BuyerId, Coins, DurationMs, ItemId, Timestamp},
    world::{UserState, World},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// `energy = min(energy + amount, max_energy)`. Returns true if energy changed.
pub fn regenerate_energy(user: &mut UserState, amount: u32) -> bool {
    let next = user.energy.saturating_add(amount).min(user.max_energy);
    if next <= user.energy {
        return false;
    }
    user.energy = next;
    true
}

pub struct EnergySubsystem {
    period_ms: DurationMs,
    amount:    u32,
}

impl EnergySubsystem {
    pub fn new(period_ms: DurationMs, amount: u32) -> Self {
        Self { period_ms, amount }
    }
}

impl SimSubsystem for EnergySubsystem {
    fn name(&self) -> &'static str { "energy" }

    fn period_ms(&self) -> DurationMs { self.period_ms }

    fn update(&mut self, now: Timestamp, world: &mut World) -> Vec<SimEvent> {
        if !regenerate_energy(&mut world.user, self.amount) {
            return vec![];
        }
        vec![SimEvent::EnergyRegenerated {
            at:     now,
            energy: world.user.energy,
        }]
    }
}

/// Outcome of a completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub buyer_id:   BuyerId,
    pub crop:       CropType,
    pub item_ids:   Vec<ItemId>,
    pub unit_price: Coins,
    pub units:      u64,
    pub total:      Coins,
}

/// Sell exactly `item_ids` (all of crop `crop`) to `buyer_id`.
///
/// All-or-nothing: one stale, foreign, repeated or already-spoiled id
/// rejects the whole call and nothing is removed or credited.
pub fn sell(
    world: &mut World,
    config: &SimConfig,
    buyer_id: &str,
    crop: CropType,
    item_ids: &[ItemId],
    now: Timestamp,
) -> ActionResult<SaleReceipt> {
    let buyer = config
        .buyer(buyer_id)
        .ok_or_else(|| ActionError::UnknownBuyer(buyer_id.to_string()))?;
    if item_ids.is_empty() {
        return Err(ActionError::EmptySale);
    }

    let mut selected: HashSet<&str> = HashSet::with_capacity(item_ids.len());
    for id in item_ids {
        if !selected.insert(id.as_str()) {
            return Err(ActionError::InvalidItemReference { item_id: id.clone() });
        }
    }

    // Units come from exactly the items that will be removed.
    let mut matched: HashSet<&str> = HashSet::with_capacity(selected.len());
    let mut units: u64 = 0;
    for item in world.inventory.iter().filter(|i| selected.contains(i.id.as_str())) {
        if item.crop != crop || item.is_expired(now) {
            return Err(ActionError::InvalidItemReference { item_id: item.id.clone() });
        }
        matched.insert(item.id.as_str());
        units += u64::from(item.quantity);
    }
    if let Some(missing) = item_ids.iter().find(|id| !matched.contains(id.as_str())) {
        return Err(ActionError::InvalidItemReference { item_id: missing.clone() });
    }

    let unit_price = price(config, &world.market, crop, buyer);
    let total = unit_price
        .checked_mul(units)
        .ok_or(ActionError::BalanceOverflow)?;
    let balance_after = world
        .user
        .balance
        .checked_add(total)
        .ok_or(ActionError::BalanceOverflow)?;

    let (sold, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut world.inventory)
        .into_iter()
        .partition(|item| selected.contains(item.id.as_str()));
    world.inventory = kept;
    for item in &sold {
        world.ledger.record_sale(item.crop, item.quantity);
    }
    world.user.balance = balance_after;

    Ok(SaleReceipt {
        buyer_id: buyer.id.clone(),
        crop,
        item_ids: item_ids.to_vec(),
        unit_price,
        units,
        total,
    })
}
