//! Market price engine: periodic trend regeneration and price derivation.
//!
//! Trends are memoryless: each refresh draws every crop's multiplier
//! independently from its configured band. Prices are never cached;
//! `price` is recomputed from current state on every call.

use crate::{
    catalog::{Buyer, CropType},
    config::SimConfig,
    event::SimEvent,
    rng::RandomSource,
    subsystem::SimSubsystem,
    types::{Coins, DurationMs, Timestamp},
    world::{MarketState, World},
};

/// Draw a fresh trend for every crop and stamp `last_updated`.
pub fn regenerate(
    market: &mut MarketState,
    config: &SimConfig,
    rng: &mut dyn RandomSource,
    now: Timestamp,
) {
    for (crop, cfg) in config.crops.iter() {
        market.trend.insert(crop, cfg.trend_band.sample(rng.next_f64()));
    }
    market.last_updated = now;
}

/// `floor(base_price × trend × buyer multiplier)`.
pub fn price(config: &SimConfig, market: &MarketState, crop: CropType, buyer: &Buyer) -> Coins {
    let raw = config.crop(crop).base_price as f64 * market.trend_for(crop) * buyer.price_multiplier;
    if raw.is_finite() && raw > 0.0 {
        raw.floor() as Coins
    } else {
        0
    }
}

pub struct MarketSubsystem {
    config: SimConfig,
    rng:    Box<dyn RandomSource>,
}

impl MarketSubsystem {
    pub fn new(config: SimConfig, rng: Box<dyn RandomSource>) -> Self {
        Self { config, rng }
    }
}

impl SimSubsystem for MarketSubsystem {
    fn name(&self) -> &'static str { "market" }

    fn period_ms(&self) -> DurationMs { self.config.timing.market_refresh_period_ms }

    fn update(&mut self, now: Timestamp, world: &mut World) -> Vec<SimEvent> {
        regenerate(&mut world.market, &self.config, self.rng.as_mut(), now);

        log::debug!(
            "t={now} market: {}",
            world
                .market
                .trend
                .iter()
                .map(|(crop, t)| format!("{crop}={t:.3}"))
                .collect::<Vec<_>>()
                .join(" ")
        );

        vec![SimEvent::MarketUpdated {
            at:    now,
            trend: world.market.trend.clone(),
        }]
    }
}
