//! NeoFarm core. The simulation and economy engine behind the farming
//! mini-game: plots, crop growth, spoilage, market prices, the player's
//! energy and coins, and write-through to a durable record store.
//!
//! Presentation (rendering, input, audio) lives elsewhere and only reads
//! `GameSnapshot`s and calls the action API on `GameEngine`.

pub mod catalog;
pub mod clock;
pub mod command;
pub mod config;
pub mod decay_subsystem;
pub mod economy_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod market_subsystem;
pub mod plot_subsystem;
pub mod rng;
pub mod snapshot;
pub mod store;
pub mod subsystem;
pub mod sync;
pub mod types;
pub mod world;
