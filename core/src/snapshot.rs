//! Read-only views handed to the presentation layer.
//!
//! A snapshot is a detached copy: nothing the UI does with it can reach
//! back into the engine's world.

use crate::{
    catalog::CropType,
    config::SimConfig,
    market_subsystem::price,
    plot_subsystem::{growth_progress, plot_status, remaining_ms, PlotStatus},
    sync::SyncStatus,
    types::{BuyerId, Coins, DurationMs, ItemId, PlotId, Timestamp},
    world::{InventoryItem, MarketState, UserState, World},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotView {
    pub id:           PlotId,
    pub unlocked:     bool,
    pub crop:         Option<CropType>,
    pub planted_at:   Option<Timestamp>,
    pub status:       PlotStatus,
    /// Growth fraction in [0, 1].
    pub progress:     f64,
    pub remaining_ms: DurationMs,
}

/// Inventory aggregated per crop, for "sell all" style actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub crop:     CropType,
    pub units:    u64,
    pub item_ids: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub crop:       CropType,
    pub buyer_id:   BuyerId,
    pub unit_price: Coins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub now:       Timestamp,
    pub user:      UserState,
    pub plots:     Vec<PlotView>,
    pub inventory: Vec<InventoryItem>,
    pub stock:     Vec<StockLine>,
    pub market:    MarketState,
    pub prices:    Vec<PriceQuote>,
    /// `None` when the session is not persisted.
    pub sync:      Option<SyncStatus>,
}

impl GameSnapshot {
    pub fn capture(
        world: &World,
        config: &SimConfig,
        now: Timestamp,
        sync: Option<SyncStatus>,
    ) -> Self {
        let plots = world
            .plots
            .iter()
            .map(|p| PlotView {
                id:           p.id.clone(),
                unlocked:     p.unlocked,
                crop:         p.crop(),
                planted_at:   p.planted_at(),
                status:       plot_status(p, config, now),
                progress:     growth_progress(p, config, now),
                remaining_ms: remaining_ms(p, config, now),
            })
            .collect();

        let prices = CropType::ALL
            .into_iter()
            .flat_map(|crop| {
                config.buyers.iter().map(move |buyer| PriceQuote {
                    crop,
                    buyer_id:   buyer.id.clone(),
                    unit_price: price(config, &world.market, crop, buyer),
                })
            })
            .collect();

        Self {
            now,
            user: world.user.clone(),
            plots,
            inventory: world.inventory.clone(),
            stock: stock_lines(world),
            market: world.market.clone(),
            prices,
            sync,
        }
    }

    pub fn stock_for(&self, crop: CropType) -> Option<&StockLine> {
        self.stock.iter().find(|s| s.crop == crop)
    }

    pub fn plot(&self, plot_id: &str) -> Option<&PlotView> {
        self.plots.iter().find(|p| p.id == plot_id)
    }
}

/// One line per crop type, in catalog order, including empty ones.
pub fn stock_lines(world: &World) -> Vec<StockLine> {
    CropType::ALL
        .into_iter()
        .map(|crop| {
            let items = world.inventory.iter().filter(|i| i.crop == crop);
            StockLine {
                crop,
                units:    items.clone().map(|i| u64::from(i.quantity)).sum(),
                item_ids: items.map(|i| i.id.clone()).collect(),
            }
        })
        .collect()
}
