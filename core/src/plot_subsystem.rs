//! Plot lifecycle: planting, derived growth status, harvest.
//!
//! Growth completion is never stored. `plot_status` compares wall-clock
//! time against the planting on every read, so no timer "finishes" a
//! crop; readiness is discovered at query or harvest time.
//!
//! Every action validates first and mutates only once all checks pass.

use crate::{
    catalog::CropType,
    config::SimConfig,
    error::{ActionError, ActionResult},
    types::{DurationMs, ItemId, Timestamp},
    world::{InventoryItem, Planting, Plot, World},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotStatus {
    Empty,
    Growing,
    Ready,
}

pub fn plot_status(plot: &Plot, config: &SimConfig, now: Timestamp) -> PlotStatus {
    match plot.planting {
        None => PlotStatus::Empty,
        Some(p) => {
            if now.saturating_sub(p.planted_at) >= config.crop(p.crop).growth_duration_ms {
                PlotStatus::Ready
            } else {
                PlotStatus::Growing
            }
        }
    }
}

/// Fraction of the growth period elapsed, clamped to [0, 1].
/// Empty plots report 0.
pub fn growth_progress(plot: &Plot, config: &SimConfig, now: Timestamp) -> f64 {
    match plot.planting {
        None => 0.0,
        Some(p) => {
            let total = config.crop(p.crop).growth_duration_ms as f64;
            (now.saturating_sub(p.planted_at) as f64 / total).min(1.0)
        }
    }
}

/// Time until the crop is ready; 0 for empty or ready plots.
pub fn remaining_ms(plot: &Plot, config: &SimConfig, now: Timestamp) -> DurationMs {
    match plot.planting {
        None => 0,
        Some(p) => config
            .crop(p.crop)
            .growth_duration_ms
            .saturating_sub(now.saturating_sub(p.planted_at)),
    }
}

/// Put `crop` into an unlocked, empty plot, paying its energy and seed cost.
pub fn plant(
    world: &mut World,
    config: &SimConfig,
    plot_id: &str,
    crop: CropType,
    now: Timestamp,
) -> ActionResult<Planting> {
    let plot = world
        .plot(plot_id)
        .ok_or_else(|| ActionError::PlotNotFound(plot_id.to_string()))?;
    if !plot.unlocked {
        return Err(ActionError::PlotLocked(plot_id.to_string()));
    }
    if plot.planting.is_some() {
        return Err(ActionError::PlotOccupied(plot_id.to_string()));
    }

    let cfg = config.crop(crop);
    let energy_after = world
        .user
        .energy
        .checked_sub(cfg.energy_cost)
        .ok_or(ActionError::InsufficientEnergy {
            required:  cfg.energy_cost,
            available: world.user.energy,
        })?;
    let balance_after = world
        .user
        .balance
        .checked_sub(cfg.seed_cost)
        .ok_or(ActionError::InsufficientFunds {
            required:  cfg.seed_cost,
            available: world.user.balance,
        })?;

    // All checks passed; apply as one unit.
    let planting = Planting { crop, planted_at: now };
    world.user.energy = energy_after;
    world.user.balance = balance_after;
    if let Some(plot) = world.plot_mut(plot_id) {
        plot.planting = Some(planting);
    }
    Ok(planting)
}

/// Collect a ready crop into inventory and clear the plot.
///
/// `next_id` is only called once every check has passed.
pub fn harvest(
    world: &mut World,
    config: &SimConfig,
    plot_id: &str,
    now: Timestamp,
    next_id: impl FnOnce() -> ItemId,
) -> ActionResult<InventoryItem> {
    let plot = world
        .plot(plot_id)
        .ok_or_else(|| ActionError::PlotNotFound(plot_id.to_string()))?;
    let planting = plot
        .planting
        .ok_or_else(|| ActionError::EmptyPlot(plot_id.to_string()))?;
    if plot_status(plot, config, now) != PlotStatus::Ready {
        return Err(ActionError::NotReady {
            plot_id:      plot_id.to_string(),
            remaining_ms: remaining_ms(plot, config, now),
        });
    }

    let cost = config.economy.harvest_energy_cost;
    let energy_after = world
        .user
        .energy
        .checked_sub(cost)
        .ok_or(ActionError::InsufficientEnergy {
            required:  cost,
            available: world.user.energy,
        })?;

    let item = InventoryItem {
        id:           next_id(),
        crop:         planting.crop,
        quantity:     config.economy.harvest_yield,
        harvested_at: now,
        expires_at:   now.saturating_add(config.crop(planting.crop).shelf_life_ms),
    };

    world.user.energy = energy_after;
    if let Some(plot) = world.plot_mut(plot_id) {
        plot.planting = None;
    }
    world.ledger.record_harvest(item.crop, item.quantity);
    world.inventory.push(item.clone());
    Ok(item)
}
