//! The game engine: one cooperative timeline for the whole economy.
//!
//! PERIODIC ORDER (fixed, documented, never reordered):
//!   1. Energy regeneration   (every 3s)
//!   2. Inventory decay sweep (every 5s)
//!   3. Market refresh        (every 60s, and once at session start)
//!   then the debounced save, once no periodic step is still due.
//!
//! RULES:
//!   - Every periodic step and every player action is one discrete,
//!     non-preemptible step; none observes another half-applied.
//!   - Steps that fall due between two calls fire at their own due
//!     time, earliest first, before the caller's action runs.
//!   - Saves that fall due while catching up on a long gap collapse
//!     into a single write at the end of the batch.
//!   - All randomness flows through injected RandomSources.
//!   - Every step's events land in the event log; events that touch
//!     persisted state restart the save debounce.

use crate::{
    catalog::CropType,
    clock::SimClock,
    command::{CommandOutcome, PlayerCommand},
    config::SimConfig,
    decay_subsystem::DecaySubsystem,
    economy_subsystem::{self, EnergySubsystem, SaleReceipt},
    error::{ActionError, ActionResult, InitializationError, PersistenceResult},
    event::{event_type_name, EventLogEntry, SimEvent},
    market_subsystem::{self, MarketSubsystem},
    plot_subsystem,
    rng::{RandomSource, RngBank, RngSlot},
    snapshot::GameSnapshot,
    store::{PlayerProfile, RecordStore},
    subsystem::SimSubsystem,
    sync::{PersistenceSync, SyncStatus},
    types::{Coins, ItemId, Timestamp},
    world::{InventoryItem, Planting, World},
};
use std::collections::VecDeque;

/// How many recent events the engine keeps in memory.
pub const EVENT_LOG_CAPACITY: usize = 1024;

struct Scheduled {
    subsystem: Box<dyn SimSubsystem>,
    next_due:  Timestamp,
}

pub struct GameEngine {
    pub clock:   SimClock,
    config:      SimConfig,
    world:       World,
    subsystems:  Vec<Scheduled>,
    harvest_rng: Box<dyn RandomSource>,
    sync:        Option<PersistenceSync>,
    event_log:   VecDeque<EventLogEntry>,
    next_seq:    u64,
    closed:      bool,
}

impl GameEngine {
    /// A non-persisted session with a fresh world.
    pub fn new(config: SimConfig, seed: u64, now: Timestamp) -> Self {
        let bank = RngBank::new(seed);
        let world = World::fresh(&config, now);
        Self::assemble(
            config,
            world,
            now,
            Box::new(bank.for_slot(RngSlot::Market)),
            Box::new(bank.for_slot(RngSlot::Harvest)),
            None,
            false,
        )
    }

    /// Builtin config, no persistence. Used by tests.
    pub fn build_test(seed: u64, now: Timestamp) -> Self {
        Self::new(SimConfig::builtin(), seed, now)
    }

    /// A non-persisted session with caller-supplied randomness.
    pub fn with_random_sources(
        config: SimConfig,
        now: Timestamp,
        market_rng: Box<dyn RandomSource>,
        harvest_rng: Box<dyn RandomSource>,
    ) -> Self {
        let world = World::fresh(&config, now);
        Self::assemble(config, world, now, market_rng, harvest_rng, None, false)
    }

    /// Resolve the player's durable record and start a persisted session.
    ///
    /// On error the caller may fall back to `GameEngine::new` and play
    /// without saving.
    pub fn start_session(
        config: SimConfig,
        seed: u64,
        now: Timestamp,
        profile: PlayerProfile,
        store: Box<dyn RecordStore>,
    ) -> Result<Self, InitializationError> {
        let (sync, loaded) = PersistenceSync::open(profile, store, &config, now)?;
        let bank = RngBank::new(seed);
        Ok(Self::assemble(
            config,
            loaded.world,
            now,
            Box::new(bank.for_slot(RngSlot::Market)),
            Box::new(bank.for_slot(RngSlot::Harvest)),
            Some(sync),
            loaded.new_record,
        ))
    }

    fn assemble(
        config: SimConfig,
        world: World,
        now: Timestamp,
        market_rng: Box<dyn RandomSource>,
        harvest_rng: Box<dyn RandomSource>,
        sync: Option<PersistenceSync>,
        new_record: bool,
    ) -> Self {
        let t = config.timing.clone();
        let regen = config.economy.energy_regen_amount;

        let mut engine = Self {
            clock: SimClock::new(now),
            subsystems: Vec::new(),
            harvest_rng,
            sync,
            event_log: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
            next_seq: 0,
            closed: false,
            world,
            config: config.clone(),
        };

        // EXECUTION ORDER: fixed and never reordered.
        engine.register(
            Box::new(EnergySubsystem::new(t.energy_regen_period_ms, regen)),
            now + t.energy_regen_period_ms,
        );
        engine.register(
            Box::new(DecaySubsystem::new(t.decay_sweep_period_ms)),
            now + t.decay_sweep_period_ms,
        );
        // Due immediately: the market is drawn once at session start.
        engine.register(Box::new(MarketSubsystem::new(config, market_rng)), now);

        let identity = engine.sync.as_ref().map(|s| s.profile().identity.clone());
        engine.log_events(
            "engine",
            vec![SimEvent::SessionStarted { at: now, identity, new_record }],
            &mut Vec::new(),
        );
        engine.advance_to(now);
        engine
    }

    fn register(&mut self, subsystem: Box<dyn SimSubsystem>, first_due: Timestamp) {
        self.subsystems.push(Scheduled { subsystem, next_due: first_due });
    }

    // ── Timeline ───────────────────────────────────────────────

    /// Run every periodic step and save that fell due up to `now`.
    /// Returns the events produced. A `now` in the past is ignored.
    pub fn advance_to(&mut self, now: Timestamp) -> Vec<SimEvent> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        if now < self.clock.now() {
            log::debug!("t={} engine: ignoring stale time {now}", self.clock.now());
            return out;
        }

        loop {
            let periodic = self
                .subsystems
                .iter()
                .enumerate()
                .filter(|(_, s)| s.next_due <= now)
                .min_by_key(|(i, s)| (s.next_due, *i))
                .map(|(i, s)| (s.next_due, i));
            let save = self
                .sync
                .as_ref()
                .and_then(PersistenceSync::deadline)
                .filter(|d| *d <= now);

            // A save only fires once no periodic step is left due by `now`;
            // saves passed over while catching up collapse into one write.
            match (periodic, save) {
                (Some((due, idx)), _) => self.fire_subsystem(idx, due, &mut out),
                (None, Some(deadline)) => {
                    if !self.fire_save(deadline, &mut out) {
                        break;
                    }
                }
                (None, None) => break,
            }
        }

        self.clock.advance_to(now);
        out
    }

    fn fire_subsystem(&mut self, idx: usize, due: Timestamp, out: &mut Vec<SimEvent>) {
        self.clock.advance_to(due);
        let Some(entry) = self.subsystems.get_mut(idx) else {
            return;
        };
        let events = entry.subsystem.update(due, &mut self.world);
        entry.next_due = due + entry.subsystem.period_ms().max(1);
        let name = entry.subsystem.name();
        self.log_events(name, events, out);
    }

    fn fire_save(&mut self, deadline: Timestamp, out: &mut Vec<SimEvent>) -> bool {
        self.clock.advance_to(deadline);
        let at = self.clock.now();
        let Some(sync) = self.sync.as_mut() else {
            return false;
        };
        let event = match sync.poll(at, &self.world) {
            None => return false,
            Some(Ok(())) => SimEvent::SaveCompleted { at },
            Some(Err(e)) => SimEvent::SaveFailed {
                at,
                reason: e.to_string(),
            },
        };
        self.log_events("sync", vec![event], out);
        true
    }

    /// Append events to the log and restart the save debounce if any
    /// of them changed persisted state.
    fn log_events(&mut self, subsystem: &str, events: Vec<SimEvent>, out: &mut Vec<SimEvent>) {
        let mutated = events.iter().any(SimEvent::touches_persisted_state);
        for event in events {
            self.push_log(subsystem, &event);
            out.push(event);
        }

        if !mutated {
            return;
        }
        if let Some(sync) = self.sync.as_mut() {
            let at = self.clock.now();
            let deadline = sync.note_mutation(at);
            let scheduled = SimEvent::SaveScheduled { at, deadline };
            self.push_log("sync", &scheduled);
            out.push(scheduled);
        }
    }

    fn push_log(&mut self, subsystem: &str, event: &SimEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("t={} engine: cannot serialize event: {e}", self.clock.now());
                return;
            }
        };
        if self.event_log.len() == EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
        }
        self.event_log.push_back(EventLogEntry {
            seq:        self.next_seq,
            at:         event.at(),
            subsystem:  subsystem.to_string(),
            event_type: event_type_name(event).to_string(),
            payload,
        });
        self.next_seq += 1;
    }

    // ── Player actions ─────────────────────────────────────────

    /// Bring the timeline up to the action's time. Returns the instant
    /// the action executes at.
    fn begin_action(&mut self, now: Timestamp) -> ActionResult<Timestamp> {
        if self.closed {
            return Err(ActionError::SessionClosed);
        }
        self.advance_to(now);
        Ok(self.clock.now())
    }

    fn reject(&mut self, action: &str, at: Timestamp, err: &ActionError) {
        log::warn!("t={at} engine: {action} rejected: {err}");
        self.log_events(
            "engine",
            vec![SimEvent::ActionRejected {
                at,
                action: action.to_string(),
                reason: err.to_string(),
            }],
            &mut Vec::new(),
        );
    }

    pub fn plant(&mut self, plot_id: &str, crop: CropType, now: Timestamp) -> ActionResult<Planting> {
        let at = self.begin_action(now)?;
        match plot_subsystem::plant(&mut self.world, &self.config, plot_id, crop, at) {
            Ok(planting) => {
                let cfg = self.config.crop(crop);
                log::info!("t={at} plot: planted {crop} in {plot_id}");
                let event = SimEvent::Planted {
                    at,
                    plot_id:     plot_id.to_string(),
                    crop,
                    energy_cost: cfg.energy_cost,
                    seed_cost:   cfg.seed_cost,
                };
                self.log_events("plot", vec![event], &mut Vec::new());
                Ok(planting)
            }
            Err(e) => {
                self.reject("plant", at, &e);
                Err(e)
            }
        }
    }

    pub fn harvest(&mut self, plot_id: &str, now: Timestamp) -> ActionResult<InventoryItem> {
        let at = self.begin_action(now)?;
        let rng = &mut self.harvest_rng;
        let result = plot_subsystem::harvest(&mut self.world, &self.config, plot_id, at, || {
            new_item_id(rng.as_mut())
        });
        match result {
            Ok(item) => {
                log::info!("t={at} plot: harvested {} from {plot_id} as {}", item.crop, item.id);
                let event = SimEvent::Harvested {
                    at,
                    plot_id:    plot_id.to_string(),
                    item_id:    item.id.clone(),
                    crop:       item.crop,
                    quantity:   item.quantity,
                    expires_at: item.expires_at,
                };
                self.log_events("plot", vec![event], &mut Vec::new());
                Ok(item)
            }
            Err(e) => {
                self.reject("harvest", at, &e);
                Err(e)
            }
        }
    }

    pub fn sell(
        &mut self,
        buyer_id: &str,
        crop: CropType,
        item_ids: &[ItemId],
        now: Timestamp,
    ) -> ActionResult<SaleReceipt> {
        let at = self.begin_action(now)?;
        match economy_subsystem::sell(&mut self.world, &self.config, buyer_id, crop, item_ids, at) {
            Ok(receipt) => {
                log::info!(
                    "t={at} economy: sold {} {crop} to {buyer_id} at {} = {}",
                    receipt.units,
                    receipt.unit_price,
                    receipt.total
                );
                let event = SimEvent::Sold {
                    at,
                    buyer_id:   receipt.buyer_id.clone(),
                    crop,
                    item_ids:   receipt.item_ids.clone(),
                    unit_price: receipt.unit_price,
                    total:      receipt.total,
                };
                self.log_events("economy", vec![event], &mut Vec::new());
                Ok(receipt)
            }
            Err(e) => {
                self.reject("sell", at, &e);
                Err(e)
            }
        }
    }

    /// Dispatch a serialized player command.
    pub fn apply(&mut self, command: PlayerCommand, now: Timestamp) -> ActionResult<CommandOutcome> {
        match command {
            PlayerCommand::Plant { plot_id, crop } => {
                let planting = self.plant(&plot_id, crop, now)?;
                Ok(CommandOutcome::Planted { plot_id, planting })
            }
            PlayerCommand::Harvest { plot_id } => {
                let item = self.harvest(&plot_id, now)?;
                Ok(CommandOutcome::Harvested { item })
            }
            PlayerCommand::Sell { buyer_id, crop, item_ids } => {
                let receipt = self.sell(&buyer_id, crop, &item_ids, now)?;
                Ok(CommandOutcome::Sold { receipt })
            }
        }
    }

    // ── Persistence ────────────────────────────────────────────

    /// Write any pending change now instead of waiting out the debounce.
    /// Also retries a failed save. A no-op for non-persisted sessions.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        let at = self.clock.now();
        let Some(sync) = self.sync.as_mut() else {
            return Ok(());
        };
        if sync.status() == SyncStatus::Idle {
            return Ok(());
        }
        let result = sync.flush(at, &self.world);
        let event = match &result {
            Ok(()) => SimEvent::SaveCompleted { at },
            Err(e) => SimEvent::SaveFailed { at, reason: e.to_string() },
        };
        self.log_events("sync", vec![event], &mut Vec::new());
        result
    }

    /// End the session: flush pending state, cancel every timer.
    /// Nothing fires afterwards and actions fail with `SessionClosed`.
    pub fn teardown(&mut self) -> PersistenceResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.flush();
        if let Some(sync) = self.sync.as_mut() {
            sync.cancel();
        }
        self.subsystems.clear();
        let at = self.clock.now();
        self.log_events("engine", vec![SimEvent::SessionClosed { at }], &mut Vec::new());
        self.closed = true;
        log::info!("t={at} engine: session closed");
        result
    }

    // ── Queries ────────────────────────────────────────────────

    /// Bring the timeline up to `now`, then capture. Use this from a render
    /// loop; `snapshot` alone reports the state as of the last step.
    pub fn snapshot_at(&mut self, now: Timestamp) -> GameSnapshot {
        self.advance_to(now);
        self.snapshot()
    }

    /// State as of the engine clock, without advancing it.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(&self.world, &self.config, self.clock.now(), self.sync_status())
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_persisted(&self) -> bool {
        self.sync.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync.as_ref().map(PersistenceSync::status)
    }

    pub fn sync(&self) -> Option<&PersistenceSync> {
        self.sync.as_ref()
    }

    /// Current unit price of `crop` for `buyer_id`.
    pub fn price(&self, crop: CropType, buyer_id: &str) -> Option<Coins> {
        let buyer = self.config.buyer(buyer_id)?;
        Some(market_subsystem::price(&self.config, &self.world.market, crop, buyer))
    }

    pub fn events(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.event_log.iter()
    }

    /// Next time any periodic step or save falls due.
    pub fn next_due(&self) -> Option<Timestamp> {
        let periodic = self.subsystems.iter().map(|s| s.next_due).min();
        let save = self.sync.as_ref().and_then(PersistenceSync::deadline);
        match (periodic, save) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

fn new_item_id(rng: &mut dyn RandomSource) -> ItemId {
    uuid::Builder::from_random_bytes(rng.next_bytes16())
        .into_uuid()
        .to_string()
}
