//! MarketFront Headless Economy Harness
//!
//! Drives the economy worker over simulated days against the in-memory store
//! with a scripted population of players, and checks the economy's
//! invariants along the way. Runs entirely in-process: no DB, no networking.
//!
//! Usage:
//!   cargo run -p marketfront-simtest
//!   cargo run -p marketfront-simtest -- --verbose --days 90 --seed 7
//!   cargo run -p marketfront-simtest -- --config tuning.json

use std::collections::BTreeMap;

use marketfront_logic::config::{CadenceConfig, EconomyConfig, SeasonConfig};
use marketfront_logic::constants::{Millis, DAY_MS, HOUR_MS, MINUTE_MS};
use marketfront_logic::engine;
use marketfront_logic::market_events::MarketEvent;
use marketfront_logic::pricing;
use marketfront_logic::scheduler::run_due;
use marketfront_logic::seasons::{percentile, Season, SeasonStatus};
use marketfront_logic::sectors::{self, EventScope, Sector};
use marketfront_logic::store::{EconomyStore, MemoryStore, StoreError};
use marketfront_logic::wagers::WagerStatus;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn check(name: &str, passed: bool, detail: String) -> Self {
        TestResult {
            name: name.into(),
            passed,
            detail,
        }
    }
}

struct Options {
    verbose: bool,
    days: i64,
    seed: u64,
    config_path: Option<String>,
}

fn parse_args() -> Options {
    let mut opts = Options {
        verbose: false,
        days: 60,
        seed: 42,
        config_path: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--verbose" => opts.verbose = true,
            "--days" => {
                if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                    opts.days = v;
                }
            }
            "--seed" => {
                if let Some(v) = args.next().and_then(|v| v.parse().ok()) {
                    opts.seed = v;
                }
            }
            "--config" => opts.config_path = args.next(),
            other => eprintln!("ignoring unknown argument {}", other),
        }
    }
    opts
}

/// Harness tuning: short seasons and regular event spawning so a couple of
/// simulated months exercise every pass.
fn harness_config() -> EconomyConfig {
    EconomyConfig {
        seasons: SeasonConfig {
            max_seasons: 6,
            length_days: 7,
        },
        cadence: CadenceConfig {
            spawn_interval_ms: Some(6 * HOUR_MS),
            ..CadenceConfig::default()
        },
        ..EconomyConfig::default()
    }
}

fn load_config(opts: &Options) -> Result<EconomyConfig, String> {
    match &opts.config_path {
        None => Ok(harness_config()),
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
            EconomyConfig::from_json(&json).map_err(|e| format!("{}: {}", path, e))
        }
    }
}

fn main() {
    let opts = parse_args();
    println!("=== MarketFront Economy Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration parsing
    results.extend(validate_config(opts.verbose));

    match load_config(&opts) {
        Ok(cfg) => {
            // 2. Multi-day economy run
            results.extend(validate_economy_run(&cfg, &opts));

            // 3. Seeded reproducibility
            results.extend(validate_reproducibility(&cfg, &opts));
        }
        Err(e) => results.push(TestResult::check(
            "config_load",
            false,
            format!("could not load config: {}", e),
        )),
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || opts.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_config(_verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let defaults = EconomyConfig::default();
    let round = EconomyConfig::from_json(&defaults.to_json());
    results.push(TestResult::check(
        "config_json_round_trip",
        round.as_ref().is_ok_and(|c| *c == defaults),
        "default config survives JSON".into(),
    ));

    let partial = EconomyConfig::from_json(r#"{"seasons": {"max_seasons": 2}}"#);
    results.push(TestResult::check(
        "config_partial_fills_defaults",
        partial
            .as_ref()
            .is_ok_and(|c| c.seasons.max_seasons == 2 && c.demand == defaults.demand),
        "missing sections fall back to defaults".into(),
    ));

    results.push(TestResult::check(
        "config_rejects_garbage",
        EconomyConfig::from_json("not json").is_err(),
        "malformed JSON is an error".into(),
    ));

    let nonsense = [
        r#"{"seasons": {"length_days": 0}}"#,
        r#"{"seasons": {"max_seasons": 0}}"#,
        r#"{"demand": {"window_ms": 0}}"#,
        r#"{"events": {"broad_probability": 2.0}}"#,
        r#"{"cadence": {"worker_interval_ms": -5}}"#,
    ];
    let accepted: Vec<&str> = nonsense
        .iter()
        .copied()
        .filter(|json| EconomyConfig::from_json(json).is_ok())
        .collect();
    results.push(TestResult::check(
        "config_rejects_nonsense",
        accepted.is_empty(),
        if accepted.is_empty() {
            format!("{} out-of-range documents refused", nonsense.len())
        } else {
            format!("accepted {:?}", accepted)
        },
    ));

    results
}

// ── 2. Multi-day run ────────────────────────────────────────────────────

const ITEMS: &[(&str, &str, u64)] = &[
    ("iron_sword", "weapon", 120),
    ("oak_bow", "weapon", 90),
    ("chain_mail", "armor", 300),
    ("health_potion", "consumable", 15),
    ("mana_potion", "consumable", 20),
    ("silk_cape", "cosmetic", 500),
];

const PLAYERS: u64 = 40;

/// Running tallies of invariant violations seen during the run.
#[derive(Default)]
struct Violations {
    demand: Vec<String>,
    volatility: Vec<String>,
    events: Vec<String>,
    seasons: Vec<String>,
}

/// One minute of scripted player activity.
fn simulate_players(store: &MemoryStore, rng: &mut StdRng, now: Millis) -> Result<(), StoreError> {
    // Shoppers: up to three purchases a minute
    for _ in 0..rng.gen_range(0..4) {
        let (item, kind, base) = ITEMS[rng.gen_range(0..ITEMS.len())];
        engine::get_price(store, item, kind, base, now)?;
        engine::record_purchase(store, item, kind, now)?;
    }

    // Seasonal players join whenever a season is running
    if rng.gen_bool(0.2) {
        let player = rng.gen_range(1..=PLAYERS);
        match engine::join_season(store, player, now) {
            Ok(_) | Err(StoreError::NotFound(_)) | Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    // Wagers: challenge, answer, settle
    if rng.gen_bool(0.3) {
        let challenger = rng.gen_range(1..=PLAYERS);
        let opponent = rng.gen_range(1..=PLAYERS);
        let stake = rng.gen_range(10..500);
        if let Err(engine::WagerError::Store(e)) =
            engine::place_wager(store, challenger, opponent, stake, now)
        {
            return Err(e);
        }
    }
    for wager in store.recent_wagers(5)? {
        let outcome = match wager.status {
            WagerStatus::Pending => {
                engine::respond_to_wager(store, wager.id, wager.opponent_id, rng.gen_bool(0.7))
            }
            WagerStatus::Accepted if rng.gen_bool(0.1) => {
                let winner = if rng.gen_bool(0.5) {
                    wager.challenger_id
                } else {
                    wager.opponent_id
                };
                engine::settle_wager(store, wager.id, wager.challenger_id, winner)
            }
            _ => continue,
        };
        if let Err(engine::WagerError::Store(e)) = outcome {
            return Err(e);
        }
    }
    Ok(())
}

fn check_demand(store: &MemoryStore, v: &mut Violations) -> Result<(), StoreError> {
    for rec in store.demand_records()? {
        let base = ITEMS
            .iter()
            .find(|(id, kind, _)| *id == rec.item_id && *kind == rec.item_type)
            .map(|(_, _, b)| *b);
        if base != Some(rec.base_price) {
            v.demand.push(format!("{} base price drifted to {}", rec.item_id, rec.base_price));
        }
        if !(0.0..=100.0).contains(&rec.demand_score) {
            v.demand.push(format!("{} score {} out of range", rec.item_id, rec.demand_score));
        }
        if rec.current_price < rec.base_price {
            v.demand.push(format!("{} priced below base", rec.item_id));
        }
        if rec.current_price > pricing::price_for_score(rec.base_price, 100.0) {
            v.demand.push(format!("{} priced above the 1.5x ceiling", rec.item_id));
        }
        if u64::from(rec.purchases_in_window) > rec.total_purchases {
            v.demand.push(format!("{} window exceeds lifetime purchases", rec.item_id));
        }
    }
    Ok(())
}

fn check_volatility(store: &MemoryStore, v: &mut Violations) -> Result<(), StoreError> {
    if let Some(s) = store.volatility()? {
        if !(0.0..=100.0).contains(&s.index)
            || !(0.75..=1.5).contains(&s.difficulty_multiplier)
            || !(0.5..=2.0).contains(&s.reward_multiplier)
        {
            v.volatility.push(format!("out of bounds: {:?}", s));
        }
    }
    Ok(())
}

fn check_events(
    store: &MemoryStore,
    cfg: &EconomyConfig,
    now: Millis,
    v: &mut Violations,
) -> Result<(), StoreError> {
    for e in store.market_events()? {
        let cap = match e.scope {
            EventScope::Sector(_) => cfg.events.sector_max_change,
            EventScope::BroadMarket => cfg.events.broad_max_change,
        };
        if e.change_percent.abs() > cap + 1e-9 {
            v.events.push(format!("event {} moves {}%", e.id, e.change_percent));
        }
        if e.expires_at - e.created_at != cfg.events.lifetime_ms {
            v.events.push(format!("event {} has the wrong lifetime", e.id));
        }
        // The worker expires every tick, so active means not yet past expiry
        if e.is_active && e.expires_at < now {
            v.events.push(format!("event {} active past expiry", e.id));
        }
    }
    Ok(())
}

fn check_seasons(
    store: &MemoryStore,
    frozen: &mut BTreeMap<u32, Season>,
    v: &mut Violations,
) -> Result<(), StoreError> {
    let seasons = store.seasons()?;
    let active = seasons.iter().filter(|s| s.is_active()).count();
    if active > 1 {
        v.seasons.push(format!("{} active seasons", active));
    }
    for (i, s) in seasons.iter().enumerate() {
        if s.season_number != i as u32 + 1 {
            v.seasons.push(format!("season numbering gap at {}", s.season_number));
        }
        if s.status != SeasonStatus::Completed {
            continue;
        }
        match frozen.get(&s.season_number) {
            Some(before) if before != s => {
                v.seasons.push(format!("completed season {} changed", s.season_number));
            }
            Some(_) => {}
            None => {
                check_standings(store, s, v)?;
                frozen.insert(s.season_number, s.clone());
            }
        }
    }
    Ok(())
}

fn check_standings(store: &MemoryStore, season: &Season, v: &mut Violations) -> Result<(), StoreError> {
    let mut rows = store.participations(season.season_number)?;
    rows.sort_by_key(|r| r.current_rank);
    let expected: Vec<Option<u32>> = (1..=rows.len() as u32).map(Some).collect();
    let ranks: Vec<Option<u32>> = rows.iter().map(|r| r.current_rank).collect();
    if ranks != expected {
        v.seasons.push(format!("season {} ranks not 1..n", season.season_number));
    }
    for pair in rows.windows(2) {
        if pair[0].current_rating < pair[1].current_rating {
            v.seasons.push(format!("season {} ranking out of order", season.season_number));
        }
        if pair[0].reward_tier < pair[1].reward_tier {
            v.seasons.push(format!("season {} tiers not monotonic", season.season_number));
        }
    }
    if season.total_players != rows.len() as u32 {
        v.seasons.push(format!("season {} player count mismatch", season.season_number));
    }
    Ok(())
}

/// Run the scripted economy for `days`. Returns the store and the events seen.
fn run_economy(
    cfg: &EconomyConfig,
    days: i64,
    seed: u64,
    violations: &mut Violations,
) -> Result<(MemoryStore, Vec<MarketEvent>), StoreError> {
    let store = MemoryStore::new();
    let mut worker_rng = StdRng::seed_from_u64(seed);
    let mut player_rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let mut frozen = BTreeMap::new();
    let step = cfg.cadence.worker_interval_ms.max(MINUTE_MS);
    let end = days * DAY_MS;

    let mut now = 0;
    while now < end {
        simulate_players(&store, &mut player_rng, now)?;
        run_due(&store, &mut worker_rng, now, cfg)?;
        check_volatility(&store, violations)?;
        check_events(&store, cfg, now, violations)?;
        if now % HOUR_MS == 0 {
            check_demand(&store, violations)?;
            check_seasons(&store, &mut frozen, violations)?;
        }
        now += step;
    }
    check_seasons(&store, &mut frozen, violations)?;
    let events = store.market_events()?;
    Ok((store, events))
}

fn validate_economy_run(cfg: &EconomyConfig, opts: &Options) -> Vec<TestResult> {
    println!("--- Economy run: {} days, seed {} ---", opts.days, opts.seed);
    let mut results = Vec::new();
    let mut v = Violations::default();

    let (store, events) = match run_economy(cfg, opts.days, opts.seed, &mut v) {
        Ok(out) => out,
        Err(e) => {
            results.push(TestResult::check(
                "economy_run",
                false,
                format!("store error: {}", e),
            ));
            return results;
        }
    };

    for (name, list) in [
        ("demand_invariants", &v.demand),
        ("volatility_bounds", &v.volatility),
        ("event_invariants", &v.events),
        ("season_invariants", &v.seasons),
    ] {
        results.push(TestResult::check(
            name,
            list.is_empty(),
            match list.first() {
                None => "no violations".into(),
                Some(first) => format!("{} violations, first: {}", list.len(), first),
            },
        ));
    }

    let records = store.demand_records().unwrap_or_default();
    let hot = records
        .iter()
        .max_by(|a, b| a.demand_score.total_cmp(&b.demand_score));
    results.push(TestResult::check(
        "demand_records_created",
        records.len() == ITEMS.len(),
        format!(
            "{} priced items, hottest {}",
            records.len(),
            hot.map(|r| format!("{} at {}", r.item_id, r.current_price))
                .unwrap_or_else(|| "none".into())
        ),
    ));

    let moved_by_sector: Vec<(Sector, usize)> = Sector::ALL
        .iter()
        .map(|&sector| {
            let moved = sectors::tickers_in_sector(sector)
                .filter(|ticker| {
                    engine::effective_price(&store, ticker, 100.0).is_ok_and(|p| p != 100.0)
                })
                .count();
            (sector, moved)
        })
        .collect();
    let tickers_moved: usize = moved_by_sector.iter().map(|(_, n)| n).sum();
    results.push(TestResult::check(
        "market_events_spawned",
        cfg.cadence.spawn_interval_ms.is_none() || !events.is_empty(),
        format!(
            "{} events over the run, {} tickers currently moved",
            events.len(),
            tickers_moved
        ),
    ));

    let seasons = store.seasons().unwrap_or_default();
    // A season opens at the start and at every full length elapsed before the end
    let length = cfg.seasons.length_ms().max(1);
    let expected_seasons = ((opts.days * DAY_MS - 1).max(0) / length + 1)
        .min(i64::from(cfg.seasons.max_seasons)) as usize;
    results.push(TestResult::check(
        "season_cadence",
        seasons.len() == expected_seasons,
        format!(
            "{} seasons opened (expected {}), cap {}",
            seasons.len(),
            expected_seasons,
            cfg.seasons.max_seasons
        ),
    ));

    if opts.verbose {
        for s in &seasons {
            println!(
                "    season {} {:?}: {} players, top {:?} at {:?}",
                s.season_number, s.status, s.total_players, s.top_player_id, s.top_rating
            );
            if s.status != SeasonStatus::Completed {
                continue;
            }
            let mut rows = store.participations(s.season_number).unwrap_or_default();
            rows.retain(|r| r.current_rank.is_some());
            rows.sort_by_key(|r| r.current_rank);
            for r in rows.iter().take(3) {
                let (Some(rank), Some(tier)) = (r.current_rank, r.reward_tier) else {
                    continue;
                };
                println!(
                    "      #{} player {} rating {} ({:.0}th pct, {})",
                    rank,
                    r.player_id,
                    r.current_rating,
                    percentile(rank, s.total_players),
                    tier.name()
                );
            }
        }
        for (sector, moved) in moved_by_sector.iter().filter(|(_, n)| *n > 0) {
            println!("    {}: {} tickers moved", sector.label(), moved);
        }
        if let Ok(Some(vol)) = store.volatility() {
            println!(
                "    volatility {:.0} ({:?}), difficulty {:.2}, rewards {:.2}",
                vol.index, vol.trend, vol.difficulty_multiplier, vol.reward_multiplier
            );
        }
    }

    results
}

// ── 3. Reproducibility ──────────────────────────────────────────────────

fn validate_reproducibility(cfg: &EconomyConfig, opts: &Options) -> Vec<TestResult> {
    println!("--- Reproducibility ---");
    let days = opts.days.min(7);
    let run = |seed| {
        let mut ignored = Violations::default();
        run_economy(cfg, days, seed, &mut ignored).map(|(_, events)| events)
    };
    let same = match (run(opts.seed), run(opts.seed)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    vec![TestResult::check(
        "seeded_runs_identical",
        same,
        format!("two {}-day runs with seed {} match", days, opts.seed),
    )]
}
