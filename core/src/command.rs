use crate::{
    catalog::CropType,
    economy_subsystem::SaleReceipt,
    types::{BuyerId, ItemId, PlotId},
    world::{InventoryItem, Planting},
};
use serde::{Deserialize, Serialize};

/// All player-issued actions.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    Plant {
        plot_id: PlotId,
        crop:    CropType,
    },
    Harvest {
        plot_id: PlotId,
    },
    Sell {
        buyer_id: BuyerId,
        crop:     CropType,
        item_ids: Vec<ItemId>,
    },
}

impl PlayerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plant { .. }   => "plant",
            Self::Harvest { .. } => "harvest",
            Self::Sell { .. }    => "sell",
        }
    }
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Planted { plot_id: PlotId, planting: Planting },
    Harvested { item: InventoryItem },
    Sold { receipt: SaleReceipt },
}
