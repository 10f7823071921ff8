//! Crop catalog: immutable crop and buyer parameters.
//!
//! Loaded once at process start and never mutated. Every crop type has
//! exactly one entry, so lookups are total.

use crate::types::{BuyerId, Coins, DurationMs};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CropType {
    Potato,
    Tomato,
    Pumpkin,
}

impl CropType {
    pub const ALL: [CropType; 3] = [CropType::Potato, CropType::Tomato, CropType::Pumpkin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Potato  => "POTATO",
            Self::Tomato  => "TOMATO",
            Self::Pumpkin => "PUMPKIN",
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band `[min, max]` a market trend is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendBand {
    pub min: f64,
    pub max: f64,
}

impl TrendBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Map a unit roll in `[0, 1)` into the band. The result never leaves
    /// `[min, max]`, even after rounding.
    pub fn sample(&self, unit: f64) -> f64 {
        (self.min + unit.clamp(0.0, 1.0) * (self.max - self.min))
            .max(self.min)
            .min(self.max)
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    pub name:               String,
    pub growth_duration_ms: DurationMs,
    pub shelf_life_ms:      DurationMs,
    pub base_price:         Coins,
    pub energy_cost:        u32,
    pub seed_cost:          Coins,
    pub trend_band:         TrendBand,
    #[serde(default)]
    pub icon:               String,
    #[serde(default)]
    pub color:              String,
}

/// One entry per crop type. Deserializes from an object keyed by
/// `POTATO` / `TOMATO` / `PUMPKIN`; a missing key is a load error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CropTable {
    pub potato:  CropConfig,
    pub tomato:  CropConfig,
    pub pumpkin: CropConfig,
}

impl CropTable {
    pub fn get(&self, crop: CropType) -> &CropConfig {
        match crop {
            CropType::Potato  => &self.potato,
            CropType::Tomato  => &self.tomato,
            CropType::Pumpkin => &self.pumpkin,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (CropType, &CropConfig)> {
        CropType::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// The reference catalog.
    pub fn reference() -> Self {
        Self {
            potato: CropConfig {
                name:               "Cyber Potato".into(),
                growth_duration_ms: 10 * 1000,
                shelf_life_ms:      24 * 60 * 60 * 1000,
                base_price:         5,
                energy_cost:        10,
                seed_cost:          0,
                trend_band:         TrendBand::new(0.8, 1.2),
                icon:               "🥔".into(),
                color:              "yellow".into(),
            },
            tomato: CropConfig {
                name:               "Neon Tomato".into(),
                growth_duration_ms: 30 * 1000,
                shelf_life_ms:      2 * 60 * 60 * 1000,
                base_price:         15,
                energy_cost:        20,
                seed_cost:          2,
                trend_band:         TrendBand::new(0.7, 1.3),
                icon:               "🍅".into(),
                color:              "red".into(),
            },
            pumpkin: CropConfig {
                name:               "Quantum Pumpkin".into(),
                growth_duration_ms: 60 * 1000,
                shelf_life_ms:      12 * 60 * 60 * 1000,
                base_price:         50,
                energy_cost:        50,
                seed_cost:          10,
                trend_band:         TrendBand::new(0.9, 1.4),
                icon:               "🎃".into(),
                color:              "orange".into(),
            },
        }
    }
}

/// A sale counterparty. Carries no owned state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub id:               BuyerId,
    pub name:             String,
    #[serde(default)]
    pub description:      String,
    pub price_multiplier: f64,
}

pub fn reference_buyers() -> Vec<Buyer> {
    vec![
        Buyer {
            id:               "1".into(),
            name:             "Chef G0rdon".into(),
            description:      "Values fresh organic produce.".into(),
            price_multiplier: 1.0,
        },
        Buyer {
            id:               "2".into(),
            name:             "Stalker X".into(),
            description:      "Buys everything for pennies.".into(),
            price_multiplier: 0.8,
        },
        Buyer {
            id:               "3".into(),
            name:             "Elite Corpo".into(),
            description:      "Pays a premium for quality.".into(),
            price_multiplier: 1.2,
        },
    ]
}
