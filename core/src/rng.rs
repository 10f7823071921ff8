//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! All randomness flows through a `RandomSource`. In production that is a
//! `SubsystemRng` derived from the session's master seed; tests inject a
//! `SequenceSource` to pin exact values.
//!
//! Each stream is seeded from (master_seed XOR slot_index), so adding a
//! new slot never changes the existing streams.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Injectable source of randomness.
pub trait RandomSource: Send {
    /// Roll a float in [0.0, 1.0).
    fn next_f64(&mut self) -> f64;

    /// Draw a raw u64 (full range).
    fn next_u64(&mut self) -> u64;

    /// Fill 16 bytes, for building identifiers.
    fn next_bytes16(&mut self) -> [u8; 16] {
        let hi = self.next_u64().to_be_bytes();
        let lo = self.next_u64().to_be_bytes();
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&hi);
        out[8..].copy_from_slice(&lo);
        out
    }
}

/// A named, deterministic RNG for a single subsystem.
pub struct SubsystemRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SubsystemRng {
    /// Create a subsystem RNG from the master seed and a stable
    /// slot index. The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl RandomSource for SubsystemRng {
    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }
}

/// Replays a fixed list of unit rolls, cycling when exhausted.
/// Integer draws come from a counter so generated ids stay unique.
pub struct SequenceSource {
    rolls:   Vec<f64>,
    cursor:  usize,
    counter: u64,
}

impl SequenceSource {
    pub fn new(rolls: Vec<f64>) -> Self {
        Self { rolls, cursor: 0, counter: 0 }
    }

    /// Every roll returns the same value.
    pub fn constant(roll: f64) -> Self {
        Self::new(vec![roll])
    }
}

impl RandomSource for SequenceSource {
    fn next_f64(&mut self) -> f64 {
        if self.rolls.is_empty() {
            return 0.0;
        }
        let roll = self.rolls[self.cursor % self.rolls.len()];
        self.cursor += 1;
        roll
    }

    fn next_u64(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }
}

/// Derives every stream for one session from a single master seed.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_slot(&self, slot: RngSlot) -> SubsystemRng {
        SubsystemRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Append only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngSlot {
    Market = 0,
    Harvest = 1,
}

impl RngSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Market  => "market",
            Self::Harvest => "harvest",
        }
    }
}
