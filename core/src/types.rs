//! Shared primitive types used across the entire simulation.

/// Wall-clock position on the simulation timeline, in milliseconds
/// since the Unix epoch. All timing is client-observed.
pub type Timestamp = u64;

/// A span of time in milliseconds.
pub type DurationMs = u64;

/// Plot identifier, assigned once at world creation (`plot-0`, `plot-1`, ...).
pub type PlotId = String;

/// Inventory item identifier, generated at harvest time.
pub type ItemId = String;

/// Buyer identifier from the static buyer table.
pub type BuyerId = String;

/// External identity a durable record is keyed by.
pub type Identity = String;

/// Whole units of in-game currency.
pub type Coins = u64;
