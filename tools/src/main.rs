//! farm-runner: headless driver for the NeoFarm engine.
//!
//! Usage:
//!   farm-runner --seed 12345 --identity player-1 --db farm.db
//!   farm-runner --offline --demo-ms 120000
//!   farm-runner --identity player-1 --ipc-mode

use anyhow::Result;
use neofarm_core::{
    catalog::CropType,
    clock::wall_clock_ms,
    command::PlayerCommand,
    config::SimConfig,
    engine::GameEngine,
    plot_subsystem::PlotStatus,
    snapshot::GameSnapshot,
    store::{PlayerProfile, RecordStore, SimStore},
    types::{DurationMs, Timestamp},
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Act { command: PlayerCommand },
    /// Sell every held unit of `crop` to `buyer_id`.
    SellAll { buyer_id: String, crop: CropType },
    Advance { ms: DurationMs },
    Flush,
    Quit,
}

#[derive(serde::Serialize)]
struct IpcReply {
    ok:    bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    state: GameSnapshot,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let demo_ms = parse_arg(&args, "--demo-ms", 90_000u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let offline = args.iter().any(|a| a == "--offline");
    let identity = flag_value(&args, "--identity").unwrap_or("local-player");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir");

    let config = match data_dir {
        Some(dir) => SimConfig::load(dir)?,
        None => SimConfig::builtin(),
    };

    if !ipc_mode {
        println!("NeoFarm farm-runner");
        println!("  seed:      {seed}");
        println!("  identity:  {identity}");
        println!("  db:        {}", if offline { "(offline)" } else { db });
        println!("  data_dir:  {}", data_dir.unwrap_or("(builtin)"));
        println!("  started:   {}", chrono::Utc::now().to_rfc3339());
        println!();
    }

    let now = wall_clock_ms();
    let mut engine = if offline {
        GameEngine::new(config, seed, now)
    } else {
        start_persisted(config, seed, now, identity, db)
    };

    if ipc_mode {
        run_ipc_loop(&mut engine, now)?;
    } else {
        run_demo(&mut engine, now, demo_ms);
        print_summary(&engine);
    }

    if let Err(e) = engine.teardown() {
        log::warn!("final save failed: {e}");
    }
    Ok(())
}

/// Start a saved session, falling back to an unsaved one if the store
/// cannot be opened or the record cannot be resolved.
fn start_persisted(
    config: SimConfig,
    seed: u64,
    now: Timestamp,
    identity: &str,
    db: &str,
) -> GameEngine {
    let store = match open_store(db) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("cannot open store {db}: {e}; playing offline");
            return GameEngine::new(config, seed, now);
        }
    };
    match GameEngine::start_session(config.clone(), seed, now, PlayerProfile::new(identity), store) {
        Ok(engine) => engine,
        Err(e) => {
            log::warn!("session start failed: {e}; playing offline");
            GameEngine::new(config, seed, now)
        }
    }
}

fn open_store(db: &str) -> Result<Box<dyn RecordStore>> {
    let store = if db == ":memory:" {
        SimStore::in_memory()?
    } else {
        SimStore::open(db)?
    };
    store.migrate()?;
    Ok(Box::new(store))
}

fn run_ipc_loop(engine: &mut GameEngine, started_at: Timestamp) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();
    // Fast-forwarded time on top of the wall clock.
    let mut skipped: DurationMs = 0;

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "ok": false, "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let now = wall_clock_ms().max(started_at) + skipped;
        let error = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {
                engine.advance_to(now);
                None
            }
            IpcCommand::Advance { ms } => {
                skipped += ms;
                engine.advance_to(now + ms);
                None
            }
            IpcCommand::Act { command } => engine.apply(command, now).err().map(|e| e.to_string()),
            IpcCommand::SellAll { buyer_id, crop } => {
                engine.advance_to(now);
                let ids = engine
                    .snapshot()
                    .stock_for(crop)
                    .map(|line| line.item_ids.clone())
                    .unwrap_or_default();
                engine
                    .sell(&buyer_id, crop, &ids, now)
                    .err()
                    .map(|e| e.to_string())
            }
            IpcCommand::Flush => engine.flush().err().map(|e| e.to_string()),
        };

        let reply = IpcReply {
            ok: error.is_none(),
            error,
            state: engine.snapshot(),
        };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

/// Plant every unlocked plot, let the crops grow, harvest, and sell each
/// crop to whichever buyer pays most.
fn run_demo(engine: &mut GameEngine, start: Timestamp, duration_ms: DurationMs) {
    let crops = CropType::ALL;
    let plot_ids: Vec<String> = engine
        .world()
        .plots
        .iter()
        .filter(|p| p.unlocked)
        .map(|p| p.id.clone())
        .collect();

    for (i, plot_id) in plot_ids.iter().enumerate() {
        let crop = crops[i % crops.len()];
        if let Err(e) = engine.plant(plot_id, crop, start) {
            println!("  plant {crop} in {plot_id}: {e}");
        }
    }

    let end = start + duration_ms;
    let mut now = start;
    while now < end {
        now = (now + 5_000).min(end);
        engine.advance_to(now);

        let ready: Vec<String> = engine
            .snapshot()
            .plots
            .iter()
            .filter(|p| p.status == PlotStatus::Ready)
            .map(|p| p.id.clone())
            .collect();
        for plot_id in ready {
            match engine.harvest(&plot_id, now) {
                Ok(item) => println!("  t+{:>6}ms harvested {} from {plot_id}", now - start, item.crop),
                Err(e) => println!("  t+{:>6}ms harvest {plot_id}: {e}", now - start),
            }
        }
    }

    for crop in crops {
        let Some(line) = engine.snapshot().stock_for(crop).cloned() else {
            continue;
        };
        if line.item_ids.is_empty() {
            continue;
        }
        let best = engine
            .config()
            .buyers
            .iter()
            .filter_map(|b| engine.price(crop, &b.id).map(|p| (p, b.id.clone())))
            .max();
        let Some((_, buyer_id)) = best else {
            continue;
        };
        match engine.sell(&buyer_id, crop, &line.item_ids, now) {
            Ok(receipt) => println!(
                "  sold {} {crop} to buyer {buyer_id} at {} = {}",
                receipt.units, receipt.unit_price, receipt.total
            ),
            Err(e) => println!("  sell {crop}: {e}"),
        }
    }
}

fn print_summary(engine: &GameEngine) {
    let snapshot = engine.snapshot();
    println!();
    println!("=== SESSION SUMMARY ===");
    println!("  elapsed:    {}ms", engine.clock.elapsed_ms());
    println!("  balance:    {}", snapshot.user.balance);
    println!("  energy:     {}/{}", snapshot.user.energy, snapshot.user.max_energy);
    println!("  persisted:  {}", engine.is_persisted());
    if let Some(sync) = engine.sync() {
        println!(
            "  saves:      {} ok, {} failed ({:?})",
            sync.saves_completed(),
            sync.saves_failed(),
            sync.status()
        );
    }

    println!();
    println!("=== INVENTORY ===");
    for line in &snapshot.stock {
        println!("  {:<8} {}", line.crop.as_str(), line.units);
    }

    println!();
    println!("=== MARKET ===");
    for (crop, trend) in &snapshot.market.trend {
        println!("  {:<8} x{trend:.3}", crop.as_str());
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
