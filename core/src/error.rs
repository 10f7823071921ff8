use crate::types::{BuyerId, Coins, DurationMs, ItemId, PlotId};
use thiserror::Error;

/// Infrastructure failures: opening the database, applying migrations,
/// loading configuration.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// A player action whose preconditions were not met.
///
/// Returned as an ordinary value; the world is never mutated when one of
/// these is produced. Not retryable without changing the inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("plot '{0}' does not exist")]
    PlotNotFound(PlotId),

    #[error("plot '{0}' is locked")]
    PlotLocked(PlotId),

    #[error("plot '{0}' already has a crop")]
    PlotOccupied(PlotId),

    #[error("plot '{0}' has nothing planted")]
    EmptyPlot(PlotId),

    #[error("plot '{plot_id}' is not ready ({remaining_ms}ms left)")]
    NotReady {
        plot_id:      PlotId,
        remaining_ms: DurationMs,
    },

    #[error("insufficient energy: need {required}, have {available}")]
    InsufficientEnergy { required: u32, available: u32 },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: Coins, available: Coins },

    #[error("unknown buyer '{0}'")]
    UnknownBuyer(BuyerId),

    #[error("item '{item_id}' is not a sellable item of this crop")]
    InvalidItemReference { item_id: ItemId },

    #[error("no items given to sell")]
    EmptySale,

    #[error("sale total would overflow the balance")]
    BalanceOverflow,

    #[error("session has been torn down")]
    SessionClosed,
}

pub type ActionResult<T> = Result<T, ActionError>;

/// The durable store was unreachable or refused a request.
/// Never fatal to gameplay: local state stays authoritative.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request: {0}")]
    Rejected(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Session start failed. The caller decides whether to continue in a
/// non-persisted mode.
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("no player identity supplied")]
    MissingIdentity,

    #[error("failed to fetch player record: {0}")]
    Fetch(#[source] PersistenceError),

    #[error("failed to create player record: {0}")]
    Create(#[source] PersistenceError),
}
