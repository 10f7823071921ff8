//! Session start, debounced write-through, and teardown against a
//! record store.

use neofarm_core::{
    catalog::CropType,
    config::SimConfig,
    engine::GameEngine,
    error::{ActionError, InitializationError},
    event::SimEvent,
    plot_subsystem::PlotStatus,
    store::{MemoryStore, PlayerProfile, RecordStore, SimStore, UserRecord},
    sync::SyncStatus,
    world::{InventoryItem, Planting, Plot},
};

const T0: u64 = 1_700_000_000_000;

/// Builtin tables with energy regeneration switched off, so the only
/// mutations are the ones a test performs.
fn quiet_config() -> SimConfig {
    let mut config = SimConfig::builtin();
    config.economy.energy_regen_amount = 0;
    config
}

fn start(store: &MemoryStore, config: SimConfig, now: u64) -> GameEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    GameEngine::start_session(config, 7, now, PlayerProfile::new("player-1"), Box::new(store.clone()))
        .unwrap_or_else(|e| panic!("session start failed: {e}"))
}

fn record(balance: u64, energy: u32, plots: Option<Vec<Plot>>) -> UserRecord {
    UserRecord {
        identity: "player-1".into(),
        username: Some("neo".into()),
        first_name: None,
        balance,
        energy,
        max_energy: 1000,
        inventory: vec![],
        plots,
    }
}

#[test]
fn first_session_creates_a_default_record() {
    let store = MemoryStore::new();
    let engine = start(&store, SimConfig::builtin(), T0);

    assert!(engine.is_persisted());
    assert_eq!(engine.sync_status(), Some(SyncStatus::Idle));
    assert_eq!(store.create_calls(), 1);

    let saved = store.record("player-1").expect("record created");
    assert_eq!(saved.balance, 100);
    assert_eq!(saved.energy, 500);
    assert_eq!(saved.max_energy, 1000);
    assert!(saved.inventory.is_empty());
    assert_eq!(saved.plots.as_ref().map(Vec::len), Some(6));

    assert_eq!(engine.world().user.balance, 100);
    let started = engine.events().find(|e| e.event_type == "session_started").expect("logged");
    assert!(started.payload.contains(r#""new_record":true"#));
}

#[test]
fn existing_record_is_hydrated_not_recreated() {
    let store = MemoryStore::new();
    let mut plots = neofarm_core::world::default_plots(6, 4);
    plots[0].planting = Some(Planting { crop: CropType::Tomato, planted_at: T0 - 10_000 });
    let mut existing = record(42, 321, Some(plots));
    existing.inventory = vec![InventoryItem {
        id:           "kept".into(),
        crop:         CropType::Pumpkin,
        quantity:     1,
        harvested_at: T0 - 1_000,
        expires_at:   T0 + 1_000_000,
    }];
    store.insert(existing);

    let engine = start(&store, SimConfig::builtin(), T0);

    assert_eq!(store.create_calls(), 0);
    let world = engine.world();
    assert_eq!(world.user.balance, 42);
    assert_eq!(world.user.energy, 321);
    assert_eq!(world.inventory.len(), 1);
    assert_eq!(world.plots.iter().filter(|p| p.unlocked).count(), 4);

    let view = engine.snapshot().plot("plot-0").cloned().expect("plot-0");
    assert_eq!(view.status, PlotStatus::Growing);
    assert_eq!(view.remaining_ms, 20_000);
    assert!(world.conservation_holds());
}

#[test]
fn record_without_plots_gets_the_default_layout() {
    let store = MemoryStore::new();
    store.insert(record(5, 5, None));

    let engine = start(&store, SimConfig::builtin(), T0);

    assert_eq!(engine.world().plots.len(), 6);
    assert!(engine.world().plots.iter().all(|p| p.planting.is_none()));
}

#[test]
fn session_start_failures_are_typed() {
    let store = MemoryStore::new();
    let blank = GameEngine::start_session(
        SimConfig::builtin(),
        1,
        T0,
        PlayerProfile::new("  "),
        Box::new(store.clone()),
    );
    assert!(matches!(blank, Err(InitializationError::MissingIdentity)));
    assert_eq!(store.get_calls(), 0);

    store.fail_next_gets(1);
    let fetch = GameEngine::start_session(
        SimConfig::builtin(),
        1,
        T0,
        PlayerProfile::new("player-1"),
        Box::new(store.clone()),
    );
    assert!(matches!(fetch, Err(InitializationError::Fetch(_))));

    store.fail_next_creates(1);
    let create = GameEngine::start_session(
        SimConfig::builtin(),
        1,
        T0,
        PlayerProfile::new("player-1"),
        Box::new(store.clone()),
    );
    assert!(matches!(create, Err(InitializationError::Create(_))));
    assert!(store.record("player-1").is_none());
}

#[test]
fn burst_of_mutations_is_written_once() {
    let mut config = SimConfig::builtin();
    config.economy.plot_count = 10;
    config.economy.unlocked_plots = 10;
    let store = MemoryStore::new();
    store.insert(record(100, 1000, None));
    let mut engine = start(&store, config, T0);

    for i in 0..10u64 {
        engine
            .plant(&format!("plot-{i}"), CropType::Potato, T0 + i * 100)
            .expect("plant");
    }
    assert_eq!(engine.sync_status(), Some(SyncStatus::Scheduled));

    engine.advance_to(T0 + 2_899);
    assert_eq!(store.update_calls(), 0);

    let events = engine.advance_to(T0 + 2_900);
    assert_eq!(store.update_calls(), 1);
    assert!(events.contains(&SimEvent::SaveCompleted { at: T0 + 2_900 }));
    assert_eq!(engine.sync_status(), Some(SyncStatus::Idle));

    let saved = store.record("player-1").expect("record");
    assert_eq!(saved.energy, 900);
    let plots = saved.plots.expect("plots persisted");
    assert!(plots.iter().all(|p| p.crop() == Some(CropType::Potato)));
}

#[test]
fn periodic_steps_run_before_a_coinciding_save() {
    let store = MemoryStore::new();
    let mut engine = start(&store, SimConfig::builtin(), T0);

    // Deadline lands on the energy tick at T0+3000; the regen mutates
    // first and pushes the save out by another window.
    engine.plant("plot-0", CropType::Potato, T0 + 1_000).expect("plant");
    assert_eq!(engine.sync().and_then(|s| s.deadline()), Some(T0 + 3_000));

    engine.advance_to(T0 + 3_000);
    assert_eq!(store.update_calls(), 0);
    assert_eq!(engine.sync().and_then(|s| s.deadline()), Some(T0 + 5_000));

    engine.advance_to(T0 + 5_000);
    assert_eq!(store.update_calls(), 1);
    assert_eq!(store.record("player-1").expect("record").energy, 491);
}

#[test]
fn failed_save_keeps_local_state_and_flush_retries() {
    let store = MemoryStore::new();
    let mut engine = start(&store, quiet_config(), T0);
    store.fail_next_updates(1);

    engine.plant("plot-0", CropType::Tomato, T0).expect("plant");
    let events = engine.advance_to(T0 + 2_000);

    assert!(events.iter().any(|e| matches!(e, SimEvent::SaveFailed { .. })));
    assert_eq!(engine.sync_status(), Some(SyncStatus::Dirty));
    assert_eq!(engine.world().user.balance, 98, "local state is authoritative");
    assert_eq!(engine.world().plot("plot-0").and_then(|p| p.crop()), Some(CropType::Tomato));
    let sync = engine.sync().expect("persisted");
    assert_eq!(sync.saves_failed(), 1);
    assert!(sync.last_error().is_some());
    assert_eq!(store.record("player-1").expect("record").balance, 100);

    engine.flush().expect("retry succeeds");
    assert_eq!(engine.sync_status(), Some(SyncStatus::Idle));
    assert_eq!(store.update_calls(), 2);
    assert_eq!(store.record("player-1").expect("record").balance, 98);

    // Nothing pending: another flush does not touch the store.
    engine.flush().expect("no-op flush");
    assert_eq!(store.update_calls(), 2);
}

#[test]
fn next_mutation_retries_a_failed_save() {
    let store = MemoryStore::new();
    let mut engine = start(&store, quiet_config(), T0);
    store.fail_next_updates(1);

    engine.plant("plot-0", CropType::Potato, T0).expect("plant");
    engine.advance_to(T0 + 2_000);
    assert_eq!(engine.sync_status(), Some(SyncStatus::Dirty));

    engine.plant("plot-1", CropType::Potato, T0 + 2_500).expect("plant");
    engine.advance_to(T0 + 4_500);

    assert_eq!(store.update_calls(), 2);
    assert_eq!(engine.sync_status(), Some(SyncStatus::Idle));
    let plots = store.record("player-1").and_then(|r| r.plots).expect("plots");
    assert!(plots[0].planting.is_some() && plots[1].planting.is_some());
}

#[test]
fn teardown_flushes_then_nothing_fires() {
    let store = MemoryStore::new();
    let mut engine = start(&store, SimConfig::builtin(), T0);
    engine.plant("plot-0", CropType::Pumpkin, T0 + 100).expect("plant");
    engine.advance_to(T0 + 500);

    engine.teardown().expect("teardown flush");

    assert!(engine.is_closed());
    assert_eq!(store.update_calls(), 1);
    assert_eq!(store.record("player-1").expect("record").balance, 90);

    let energy = engine.world().user.energy;
    assert!(engine.advance_to(T0 + 3_600_000).is_empty());
    assert_eq!(engine.world().user.energy, energy);
    assert_eq!(engine.next_due(), None);
    assert_eq!(store.update_calls(), 1);
    assert_eq!(
        engine.harvest("plot-0", T0 + 3_600_000),
        Err(ActionError::SessionClosed)
    );
    assert!(engine.teardown().is_ok());
}

#[test]
fn plantings_survive_across_sessions() {
    let store = MemoryStore::new();
    let mut first = start(&store, quiet_config(), T0);
    first.plant("plot-2", CropType::Tomato, T0).expect("plant");
    first.teardown().expect("teardown");

    let mut second = start(&store, quiet_config(), T0 + 40_000);
    assert_eq!(
        second.snapshot().plot("plot-2").map(|p| p.status),
        Some(PlotStatus::Ready)
    );
    let item = second.harvest("plot-2", T0 + 40_000).expect("harvest");
    assert_eq!(item.crop, CropType::Tomato);
    assert_eq!(second.world().user.balance, 98);
}

#[test]
fn sqlite_store_round_trips_a_session() {
    let path = std::env::temp_dir().join(format!(
        "neofarm-session-{}-{}.db",
        std::process::id(),
        T0
    ));
    let path = path.to_string_lossy().into_owned();
    let _ = std::fs::remove_file(&path);

    let store = SimStore::open(&path).expect("open");
    store.migrate().expect("migrate");
    let mut engine = GameEngine::start_session(
        quiet_config(),
        3,
        T0,
        PlayerProfile::new("sqlite-player"),
        Box::new(store),
    )
    .unwrap_or_else(|e| panic!("start: {e}"));
    engine.plant("plot-1", CropType::Potato, T0).expect("plant");
    let item = engine.harvest("plot-1", T0 + 10_000).expect("harvest");
    engine.teardown().expect("teardown");
    drop(engine);

    let mut reopened = SimStore::open(&path).expect("reopen");
    reopened.migrate().expect("migrate is idempotent");
    assert_eq!(reopened.record_count().expect("count"), 1);
    let saved = reopened
        .get_user_record("sqlite-player")
        .expect("fetch")
        .expect("record exists");
    assert_eq!(saved.energy, 500 - 10 - 5);
    assert_eq!(saved.inventory, vec![item]);
    assert!(saved.plots.expect("plots")[1].planting.is_none());

    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(format!("{path}-wal"));
    let _ = std::fs::remove_file(format!("{path}-shm"));
}

#[test]
fn long_catch_up_collapses_saves_into_one_write() {
    let store = MemoryStore::new();
    store.insert(record(100, 0, None));
    let mut engine = start(&store, SimConfig::builtin(), T0);

    // Energy refills one point per tick for 1000 ticks; each tick is a
    // mutation that would otherwise schedule its own save.
    let events = engine.advance_to(T0 + 3_600_000);

    assert_eq!(store.update_calls(), 1);
    let saves: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SimEvent::SaveCompleted { .. }))
        .collect();
    assert_eq!(saves, vec![&SimEvent::SaveCompleted { at: T0 + 3_600_000 }]);
    assert_eq!(engine.sync_status(), Some(SyncStatus::Idle));
    assert_eq!(store.record("player-1").expect("record").energy, 1000);
}

#[test]
fn mutation_after_a_save_is_written_by_the_next_one() {
    let store = MemoryStore::new();
    let mut engine = start(&store, quiet_config(), T0);

    engine.plant("plot-0", CropType::Potato, T0).expect("plant");
    engine.advance_to(T0 + 2_000);
    assert_eq!(store.update_calls(), 1);
    assert_eq!(engine.sync_status(), Some(SyncStatus::Idle));

    engine.plant("plot-1", CropType::Potato, T0 + 2_100).expect("plant");
    assert_eq!(engine.sync_status(), Some(SyncStatus::Scheduled));
    engine.advance_to(T0 + 4_100);

    assert_eq!(store.update_calls(), 2);
    let plots = store.record("player-1").and_then(|r| r.plots).expect("plots");
    assert!(plots[0].planting.is_some() && plots[1].planting.is_some());
}

#[test]
fn duplicate_stored_items_are_repaired_and_sold_exactly() {
    let store = MemoryStore::new();
    let stored = |quantity: u32| InventoryItem {
        id: "dup".into(),
        crop: CropType::Pumpkin,
        quantity,
        harvested_at: T0 - 1_000,
        expires_at: T0 + 1_000_000,
    };
    let mut existing = record(10, 500, None);
    existing.inventory = vec![stored(1), stored(1), stored(0)];
    store.insert(existing);
    let mut engine = start(&store, quiet_config(), T0);

    assert_eq!(engine.world().inventory.len(), 2, "empty stored item dropped");
    assert!(engine.world().item("dup").is_some());
    assert!(engine.world().item("dup-1").is_some());

    let unit = engine.price(CropType::Pumpkin, "1").expect("buyer 1");
    let receipt = engine
        .sell("1", CropType::Pumpkin, &["dup".to_string()], T0)
        .expect("sell");

    assert_eq!(receipt.units, 1);
    assert_eq!(receipt.total, unit);
    assert_eq!(engine.world().user.balance, 10 + unit);
    let left: Vec<_> = engine.world().inventory.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(left, vec!["dup-1"]);
    assert!(engine.world().conservation_holds());
}

#[test]
fn session_started_is_the_first_logged_event() {
    let store = MemoryStore::new();
    let persisted = start(&store, SimConfig::builtin(), T0);
    let first = persisted.events().next().expect("event log");
    assert_eq!(first.event_type, "session_started");
    assert!(first.payload.contains(r#""identity":"player-1""#));

    let offline = GameEngine::build_test(1, T0);
    let first = offline.events().next().expect("event log");
    assert_eq!(first.event_type, "session_started");
    assert!(first.payload.contains(r#""identity":null"#));
    assert_eq!(
        offline.events().nth(1).map(|e| e.event_type.as_str()),
        Some("market_updated")
    );
}
