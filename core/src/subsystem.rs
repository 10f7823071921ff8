//! Periodic subsystem trait.
//!
//! RULE: Every timer-driven process implements SimSubsystem.
//! The engine fires each one when its period elapses, in registration
//! order when several fall due at the same instant. Execution order is
//! fixed and documented in engine.rs.

use crate::{
    event::SimEvent,
    types::{DurationMs, Timestamp},
    world::World,
};

/// The contract every periodic subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Time between two firings.
    fn period_ms(&self) -> DurationMs;

    /// One discrete, non-preemptible step at `now`.
    ///
    /// Returns the events describing what changed; an empty vec means
    /// the world was left untouched.
    fn update(&mut self, now: Timestamp, world: &mut World) -> Vec<SimEvent>;
}
