//! Energy regeneration and sales.

use neofarm_core::{
    catalog::CropType,
    command::{CommandOutcome, PlayerCommand},
    config::SimConfig,
    economy_subsystem::{regenerate_energy, sell, EnergySubsystem},
    engine::GameEngine,
    error::ActionError,
    event::SimEvent,
    subsystem::SimSubsystem,
    world::{InventoryItem, UserState, World},
};

const T0: u64 = 1_700_000_000_000;

fn item(id: &str, crop: CropType) -> InventoryItem {
    InventoryItem {
        id: id.into(),
        crop,
        quantity: 1,
        harvested_at: T0,
        expires_at: T0 + 3_600_000,
    }
}

/// Flat market, three tomatoes and one potato in stock, 100 coins.
fn stocked() -> (World, SimConfig) {
    let config = SimConfig::builtin();
    let user = UserState { balance: 100, energy: 500, max_energy: 1000 };
    let inventory = vec![
        item("t1", CropType::Tomato),
        item("t2", CropType::Tomato),
        item("p1", CropType::Potato),
        item("t3", CropType::Tomato),
    ];
    (World::hydrate(&config, user, inventory, None, T0), config)
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn regen_stops_at_the_ceiling() {
    let mut user = UserState { balance: 0, energy: 999, max_energy: 1000 };
    assert!(regenerate_energy(&mut user, 1));
    assert_eq!(user.energy, 1000);
    for _ in 0..10 {
        assert!(!regenerate_energy(&mut user, 1));
    }
    assert_eq!(user.energy, 1000);
}

#[test]
fn energy_subsystem_is_silent_when_full() {
    let config = SimConfig::builtin();
    let mut world = World::fresh(&config, 0);
    world.user.energy = world.user.max_energy;
    let mut energy = EnergySubsystem::new(3_000, 1);
    assert!(energy.update(3_000, &mut world).is_empty());

    world.user.energy = 10;
    assert_eq!(
        energy.update(6_000, &mut world),
        vec![SimEvent::EnergyRegenerated { at: 6_000, energy: 11 }]
    );
}

#[test]
fn engine_regenerates_one_point_every_three_seconds() {
    let mut engine = GameEngine::build_test(1, T0);
    assert_eq!(engine.world().user.energy, 500);

    engine.advance_to(T0 + 2_999);
    assert_eq!(engine.world().user.energy, 500);
    engine.advance_to(T0 + 30_000);
    assert_eq!(engine.world().user.energy, 510);
}

#[test]
fn sale_removes_exactly_the_named_items_and_credits() {
    let (mut world, config) = stocked();

    let receipt = sell(&mut world, &config, "1", CropType::Tomato, &ids(&["t1", "t3"]), T0).unwrap();

    assert_eq!(receipt.unit_price, 15);
    assert_eq!(receipt.units, 2);
    assert_eq!(receipt.total, 30);
    assert_eq!(world.user.balance, 130);
    let left: Vec<_> = world.inventory.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(left, vec!["t2", "p1"]);
    assert!(world.conservation_holds());
}

#[test]
fn sale_credits_every_unit_of_a_stacked_item() {
    let config = SimConfig::builtin();
    let user = UserState { balance: 0, energy: 0, max_energy: 1000 };
    let stack = InventoryItem { quantity: 3, ..item("stack", CropType::Pumpkin) };
    let mut world = World::hydrate(&config, user, vec![stack], None, T0);

    let receipt = sell(&mut world, &config, "2", CropType::Pumpkin, &ids(&["stack"]), T0).unwrap();

    assert_eq!(receipt.units, 3);
    assert_eq!(receipt.total, 40 * 3);
    assert_eq!(world.user.balance, 120);
    assert!(world.inventory.is_empty());
}

#[test]
fn invalid_sales_change_nothing() {
    let (mut world, config) = stocked();
    let before = world.clone();

    let cases: Vec<(&str, CropType, Vec<String>, ActionError)> = vec![
        (
            "1",
            CropType::Tomato,
            ids(&["t1", "gone"]),
            ActionError::InvalidItemReference { item_id: "gone".into() },
        ),
        (
            "1",
            CropType::Tomato,
            ids(&["t1", "p1"]),
            ActionError::InvalidItemReference { item_id: "p1".into() },
        ),
        (
            "1",
            CropType::Tomato,
            ids(&["t2", "t2"]),
            ActionError::InvalidItemReference { item_id: "t2".into() },
        ),
        ("1", CropType::Tomato, vec![], ActionError::EmptySale),
        ("9", CropType::Tomato, ids(&["t1"]), ActionError::UnknownBuyer("9".into())),
    ];

    for (buyer, crop, item_ids, expected) in cases {
        let err = sell(&mut world, &config, buyer, crop, &item_ids, T0).unwrap_err();
        assert_eq!(err, expected, "selling {item_ids:?} to {buyer}");
        assert_eq!(world, before, "rejected sale of {item_ids:?} mutated the world");
    }
}

#[test]
fn spoiled_but_unswept_items_cannot_be_sold() {
    let (mut world, config) = stocked();
    let before = world.clone();

    let err = sell(&mut world, &config, "1", CropType::Tomato, &ids(&["t1"]), T0 + 3_600_000)
        .unwrap_err();

    assert_eq!(err, ActionError::InvalidItemReference { item_id: "t1".into() });
    assert_eq!(world, before);
}

#[test]
fn engine_commands_round_trip_through_apply() {
    let mut engine = GameEngine::build_test(21, T0);

    let planted = engine
        .apply(PlayerCommand::Plant { plot_id: "plot-1".into(), crop: CropType::Potato }, T0)
        .unwrap();
    assert!(matches!(planted, CommandOutcome::Planted { ref plot_id, .. } if plot_id == "plot-1"));

    let CommandOutcome::Harvested { item } = engine
        .apply(PlayerCommand::Harvest { plot_id: "plot-1".into() }, T0 + 10_000)
        .unwrap()
    else {
        panic!("expected a harvest outcome");
    };

    let balance = engine.world().user.balance;
    let unit = engine.price(CropType::Potato, "1").unwrap();
    let CommandOutcome::Sold { receipt } = engine
        .apply(
            PlayerCommand::Sell {
                buyer_id: "1".into(),
                crop:     CropType::Potato,
                item_ids: vec![item.id.clone()],
            },
            T0 + 10_000,
        )
        .unwrap()
    else {
        panic!("expected a sale outcome");
    };
    assert_eq!(receipt.total, unit);
    assert_eq!(engine.world().user.balance, balance + unit);
    assert!(engine.world().inventory.is_empty());

    // Selling the same id twice is a stale reference.
    let err = engine
        .apply(
            PlayerCommand::Sell {
                buyer_id: "1".into(),
                crop:     CropType::Potato,
                item_ids: vec![item.id],
            },
            T0 + 10_000,
        )
        .unwrap_err();
    assert!(matches!(err, ActionError::InvalidItemReference { .. }));
    assert!(engine.events().any(|e| e.event_type == "action_rejected"));
}

#[test]
fn commands_deserialize_from_json() {
    let cmd: PlayerCommand =
        serde_json::from_str(r#"{"cmd":"sell","buyer_id":"3","crop":"TOMATO","item_ids":["a","b"]}"#)
            .unwrap();
    assert_eq!(
        cmd,
        PlayerCommand::Sell {
            buyer_id: "3".into(),
            crop:     CropType::Tomato,
            item_ids: vec!["a".into(), "b".into()],
        }
    );
    assert_eq!(cmd.name(), "sell");
}

#[test]
fn sale_counts_units_from_the_items_removed() {
    let config = SimConfig::builtin();
    let user = UserState { balance: 0, energy: 0, max_energy: 1000 };
    // Hydration renames repeats, so both copies survive as distinct items.
    let inventory = vec![item("same", CropType::Tomato), item("same", CropType::Tomato)];
    let mut world = World::hydrate(&config, user, inventory, None, T0);

    let receipt = sell(&mut world, &config, "1", CropType::Tomato, &ids(&["same"]), T0).unwrap();

    assert_eq!(receipt.units, 1);
    assert_eq!(world.user.balance, 15);
    assert_eq!(world.inventory.len(), 1);
    assert!(world.conservation_holds());
}
