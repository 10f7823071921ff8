use crate::{
    catalog::{reference_buyers, Buyer, CropConfig, CropTable, CropType},
    error::{SimError, SimResult},
    types::{Coins, DurationMs},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub max_energy:          u32,
    pub initial_balance:     Coins,
    pub initial_energy:      u32,
    /// Flat energy cost of a harvest, independent of crop.
    pub harvest_energy_cost: u32,
    /// Units produced per harvest. Fixed; no randomness.
    pub harvest_yield:       u32,
    pub energy_regen_amount: u32,
    pub plot_count:          usize,
    /// The first `unlocked_plots` plots start unlocked.
    pub unlocked_plots:      usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            max_energy:          1000,
            initial_balance:     100,
            initial_energy:      500,
            harvest_energy_cost: 5,
            harvest_yield:       1,
            energy_regen_amount: 1,
            plot_count:          6,
            unlocked_plots:      3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub energy_regen_period_ms:   DurationMs,
    pub market_refresh_period_ms: DurationMs,
    pub decay_sweep_period_ms:    DurationMs,
    /// Quiescence window after the last mutation before a save is issued.
    pub save_debounce_ms:         DurationMs,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            energy_regen_period_ms:   3_000,
            market_refresh_period_ms: 60_000,
            decay_sweep_period_ms:    5_000,
            save_debounce_ms:         2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct BuyersFile {
    buyers: Vec<Buyer>,
}

#[derive(Debug, Clone, Deserialize)]
struct EconomyFile {
    economy: EconomyConfig,
    timing:  TimingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub crops:   CropTable,
    pub buyers:  Vec<Buyer>,
    pub economy: EconomyConfig,
    pub timing:  TimingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SimConfig {
    /// The reference tables, compiled in. Used by tests and by the
    /// runner when no data directory is given.
    pub fn builtin() -> Self {
        Self {
            crops:   CropTable::reference(),
            buyers:  reference_buyers(),
            economy: EconomyConfig::default(),
            timing:  TimingConfig::default(),
        }
    }

    /// Load from the data/ directory.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let crops_path = format!("{data_dir}/crops.json");
        let crops_content = std::fs::read_to_string(&crops_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {crops_path}: {e}"))?;
        let crops: CropTable = serde_json::from_str(&crops_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {crops_path}: {e}"))?;

        let buyers_path = format!("{data_dir}/buyers.json");
        let buyers_content = std::fs::read_to_string(&buyers_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {buyers_path}: {e}"))?;
        let buyers_file: BuyersFile = serde_json::from_str(&buyers_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {buyers_path}: {e}"))?;

        let economy_path = format!("{data_dir}/economy.json");
        let economy_content = std::fs::read_to_string(&economy_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {economy_path}: {e}"))?;
        let economy_file: EconomyFile = serde_json::from_str(&economy_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {economy_path}: {e}"))?;

        let config = Self {
            crops,
            buyers:  buyers_file.buyers,
            economy: economy_file.economy,
            timing:  economy_file.timing,
        };
        config.validate()?;
        log::info!(
            "config: loaded {} buyers from {data_dir}",
            config.buyers.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        for (crop, cfg) in self.crops.iter() {
            if !cfg.trend_band.is_valid() {
                return Err(invalid(format!(
                    "{crop}: trend band [{}, {}] must be positive and ordered",
                    cfg.trend_band.min, cfg.trend_band.max
                )));
            }
            if cfg.growth_duration_ms == 0 || cfg.shelf_life_ms == 0 {
                return Err(invalid(format!("{crop}: growth and shelf life must be non-zero")));
            }
        }

        let mut seen = HashSet::new();
        for buyer in &self.buyers {
            if !(buyer.price_multiplier.is_finite() && buyer.price_multiplier > 0.0) {
                return Err(invalid(format!(
                    "buyer '{}': price multiplier must be positive",
                    buyer.id
                )));
            }
            if !seen.insert(buyer.id.as_str()) {
                return Err(invalid(format!("duplicate buyer id '{}'", buyer.id)));
            }
        }

        let e = &self.economy;
        if e.initial_energy > e.max_energy {
            return Err(invalid(format!(
                "initial energy {} exceeds max energy {}",
                e.initial_energy, e.max_energy
            )));
        }
        if e.unlocked_plots > e.plot_count {
            return Err(invalid(format!(
                "{} unlocked plots but only {} plots",
                e.unlocked_plots, e.plot_count
            )));
        }
        if e.harvest_yield == 0 {
            return Err(invalid("harvest yield must be at least 1".into()));
        }

        let t = &self.timing;
        if t.energy_regen_period_ms == 0
            || t.market_refresh_period_ms == 0
            || t.decay_sweep_period_ms == 0
            || t.save_debounce_ms == 0
        {
            return Err(invalid("timer periods must be non-zero".into()));
        }
        Ok(())
    }

    pub fn crop(&self, crop: CropType) -> &CropConfig {
        self.crops.get(crop)
    }

    pub fn buyer(&self, buyer_id: &str) -> Option<&Buyer> {
        self.buyers.iter().find(|b| b.id == buyer_id)
    }
}

fn invalid(msg: String) -> SimError {
    SimError::Config(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir() -> String {
        format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn builtin_config_is_valid() {
        SimConfig::builtin().validate().expect("builtin config validates");
    }

    #[test]
    fn data_dir_matches_builtin_tables() {
        let loaded = SimConfig::load(&data_dir()).expect("load data dir");
        assert_eq!(loaded.crops, CropTable::reference());
        assert_eq!(loaded.economy, EconomyConfig::default());
        assert_eq!(loaded.timing, TimingConfig::default());
        assert_eq!(loaded.buyers.len(), 3);
    }

    #[test]
    fn inverted_trend_band_rejected() {
        let mut config = SimConfig::builtin();
        config.crops.tomato.trend_band.min = 1.5;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn duplicate_buyer_rejected() {
        let mut config = SimConfig::builtin();
        let dup = config.buyers[0].clone();
        config.buyers.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn initial_energy_above_ceiling_rejected() {
        let mut config = SimConfig::builtin();
        config.economy.initial_energy = config.economy.max_energy + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_data_dir_names_the_path() {
        let err = SimConfig::load("/nonexistent/neofarm").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/neofarm/crops.json"));
    }
}
