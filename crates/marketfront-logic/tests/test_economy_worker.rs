//! Integration tests for the economy worker over the in-memory store.
//!
//! Exercises: get_price → record_purchase → decay, volatility under wager
//! load, event spawn/expiry through the scheduler, and the season lifecycle
//! including concurrent openers, interleaved closers and the season cap.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use marketfront_logic::config::{CadenceConfig, EconomyConfig, SeasonConfig};
use marketfront_logic::constants::{Millis, DAY_MS, HOUR_MS, MINUTE_MS};
use marketfront_logic::engine;
use marketfront_logic::market_events::{EventDraft, MarketEvent};
use marketfront_logic::pricing::DemandRecord;
use marketfront_logic::scheduler::{run_due, ScheduleMarks};
use marketfront_logic::seasons::{RewardTier, Season, SeasonParticipation, SeasonStatus};
use marketfront_logic::store::{EconomyStore, MemoryStore, StoreResult};
use marketfront_logic::volatility::VolatilityState;
use marketfront_logic::wagers::{self, Wager, WagerStatus};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ── Helpers ────────────────────────────────────────────────────────────

fn config_with_spawning() -> EconomyConfig {
    EconomyConfig {
        cadence: CadenceConfig {
            spawn_interval_ms: Some(6 * HOUR_MS),
            ..CadenceConfig::default()
        },
        ..EconomyConfig::default()
    }
}

fn accepted_wagers(store: &MemoryStore, count: usize, now: Millis) {
    for i in 0..count {
        let mut w = store.insert_wager(1, 2 + i as u64, 100, now).unwrap();
        wagers::respond(&mut w, 2 + i as u64, true).unwrap();
        store.update_wager(&w).unwrap();
    }
}

/// Step the worker every minute from `from` (inclusive) to `to` (exclusive).
fn run_minutes(store: &MemoryStore, rng: &mut StdRng, cfg: &EconomyConfig, from: Millis, to: Millis) {
    let mut now = from;
    while now < to {
        run_due(store, rng, now, cfg).unwrap();
        now += MINUTE_MS;
    }
}

type Hook = Box<dyn FnOnce(&MemoryStore) + Send>;

/// Runs `hook` against the inner store right after the first
/// `participations` read, so another writer lands between a closer's
/// snapshot and its writes.
struct InterleavedStore {
    inner: MemoryStore,
    hook: Mutex<Option<Hook>>,
}

impl InterleavedStore {
    fn new(inner: MemoryStore, hook: impl FnOnce(&MemoryStore) + Send + 'static) -> Self {
        Self {
            inner,
            hook: Mutex::new(Some(Box::new(hook))),
        }
    }
}

impl EconomyStore for InterleavedStore {
    fn upsert_demand(&self, default: DemandRecord) -> StoreResult<DemandRecord> {
        self.inner.upsert_demand(default)
    }
    fn find_demand(&self, item_id: &str, item_type: &str) -> StoreResult<Option<DemandRecord>> {
        self.inner.find_demand(item_id, item_type)
    }
    fn update_demand_if(&self, expected: &DemandRecord, next: &DemandRecord) -> StoreResult<()> {
        self.inner.update_demand_if(expected, next)
    }
    fn demand_records(&self) -> StoreResult<Vec<DemandRecord>> {
        self.inner.demand_records()
    }
    fn volatility(&self) -> StoreResult<Option<VolatilityState>> {
        self.inner.volatility()
    }
    fn put_volatility_if(
        &self,
        expected: Option<&VolatilityState>,
        next: &VolatilityState,
    ) -> StoreResult<()> {
        self.inner.put_volatility_if(expected, next)
    }
    fn insert_event(&self, draft: EventDraft) -> StoreResult<MarketEvent> {
        self.inner.insert_event(draft)
    }
    fn update_event(&self, event: &MarketEvent) -> StoreResult<()> {
        self.inner.update_event(event)
    }
    fn market_events(&self) -> StoreResult<Vec<MarketEvent>> {
        self.inner.market_events()
    }
    fn recent_events(&self, limit: usize) -> StoreResult<Vec<MarketEvent>> {
        self.inner.recent_events(limit)
    }
    fn insert_wager(
        &self,
        challenger_id: u64,
        opponent_id: u64,
        stake: u64,
        now: Millis,
    ) -> StoreResult<Wager> {
        self.inner.insert_wager(challenger_id, opponent_id, stake, now)
    }
    fn find_wager(&self, id: u64) -> StoreResult<Option<Wager>> {
        self.inner.find_wager(id)
    }
    fn update_wager(&self, wager: &Wager) -> StoreResult<()> {
        self.inner.update_wager(wager)
    }
    fn recent_wagers(&self, limit: usize) -> StoreResult<Vec<Wager>> {
        self.inner.recent_wagers(limit)
    }
    fn seasons(&self) -> StoreResult<Vec<Season>> {
        self.inner.seasons()
    }
    fn active_season(&self) -> StoreResult<Option<Season>> {
        self.inner.active_season()
    }
    fn insert_season(&self, season: &Season) -> StoreResult<()> {
        self.inner.insert_season(season)
    }
    fn complete_season_if_active(&self, completed: &Season) -> StoreResult<()> {
        self.inner.complete_season_if_active(completed)
    }
    fn insert_participation(&self, row: &SeasonParticipation) -> StoreResult<()> {
        self.inner.insert_participation(row)
    }
    fn participations(&self, season_number: u32) -> StoreResult<Vec<SeasonParticipation>> {
        let rows = self.inner.participations(season_number)?;
        let hook = self.hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
        Ok(rows)
    }
    fn set_standing(
        &self,
        season_number: u32,
        player_id: u64,
        rank: u32,
        tier: RewardTier,
    ) -> StoreResult<()> {
        self.inner.set_standing(season_number, player_id, rank, tier)
    }
    fn add_rating(
        &self,
        season_number: u32,
        player_id: u64,
        delta: i32,
    ) -> StoreResult<SeasonParticipation> {
        self.inner.add_rating(season_number, player_id, delta)
    }
    fn schedule_marks(&self) -> StoreResult<ScheduleMarks> {
        self.inner.schedule_marks()
    }
    fn put_schedule_marks(&self, marks: &ScheduleMarks) -> StoreResult<()> {
        self.inner.put_schedule_marks(marks)
    }
}

/// Season 1 open with player 1 at 1000 and player 2 at 1200.
fn two_player_season(cfg: &SeasonConfig) -> MemoryStore {
    let store = MemoryStore::new();
    engine::ensure_active_season(&store, 0, cfg).unwrap();
    engine::join_season(&store, 1, 0).unwrap();
    engine::join_season(&store, 2, 1).unwrap();
    engine::adjust_rating(&store, 2, 200).unwrap();
    store
}

// ── Pricing ─────────────────────────────────────────────────────────────

#[test]
fn purchases_then_decay_through_worker() {
    let store = MemoryStore::new();
    let cfg = EconomyConfig::default();
    let mut rng = StdRng::seed_from_u64(1);

    engine::get_price(&store, "shield", "armor", 200, 0).unwrap();
    for i in 0..6 {
        engine::record_purchase(&store, "shield", "armor", i * MINUTE_MS).unwrap();
    }
    let hot = store.find_demand("shield", "armor").unwrap().unwrap();
    assert_eq!(hot.demand_score, 80.0);
    assert_eq!(hot.current_price, 280);

    // A day of hourly sweeps: only the one at/after the 24h mark decays it
    run_minutes(&store, &mut rng, &cfg, 0, DAY_MS + 2 * HOUR_MS);
    let cooled = store.find_demand("shield", "armor").unwrap().unwrap();
    assert_eq!(cooled.current_price, 272); // 200 + 80 * 0.9
    assert_eq!(cooled.demand_score, 72.0);
    assert_eq!(cooled.purchases_in_window, 0);
    assert_eq!(cooled.total_purchases, 6);
}

#[test]
fn concurrent_purchases_are_not_lost() {
    let store = Arc::new(MemoryStore::new());
    engine::get_price(store.as_ref(), "rune", "magic", 100, 0).unwrap();

    let threads = 4;
    let per_thread = 25;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..per_thread {
                    // Retry the rare case of exhausting CAS attempts under contention
                    while engine::record_purchase(store.as_ref(), "rune", "magic", 1).is_err() {}
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let rec = store.find_demand("rune", "magic").unwrap().unwrap();
    assert_eq!(rec.total_purchases, (threads * per_thread) as u64);
    assert_eq!(rec.purchases_in_window, (threads * per_thread) as u32);
    assert_eq!(rec.demand_score, 100.0);
    assert_eq!(rec.current_price, 150);
}

// ── Volatility ──────────────────────────────────────────────────────────

#[test]
fn busy_wager_book_lifts_index_every_five_minutes() {
    let store = MemoryStore::new();
    let cfg = EconomyConfig::default();
    let mut rng = StdRng::seed_from_u64(2);
    accepted_wagers(&store, 15, 0);

    // Ticks at 0, 5, 10, 15 minutes
    run_minutes(&store, &mut rng, &cfg, 0, 16 * MINUTE_MS);
    let v = store.volatility().unwrap().unwrap();
    assert_eq!(v.index, 58.0);
    assert!((v.difficulty_multiplier - 1.04).abs() < 1e-9);
    assert!((v.reward_multiplier - 1.08).abs() < 1e-9);
}

#[test]
fn settled_wagers_stop_counting() {
    let store = MemoryStore::new();
    accepted_wagers(&store, 12, 0);
    assert_eq!(engine::sample_signals(&store).unwrap().recent_accepted_wagers, 12);
    for mut w in store.recent_wagers(20).unwrap() {
        let caller = w.challenger_id;
        wagers::settle(&mut w, caller).unwrap();
        store.update_wager(&w).unwrap();
    }
    assert_eq!(engine::sample_signals(&store).unwrap().recent_accepted_wagers, 0);
    assert!(store
        .recent_wagers(20)
        .unwrap()
        .iter()
        .all(|w| w.status == WagerStatus::Settled));
}

// ── Market events ───────────────────────────────────────────────────────

#[test]
fn scheduled_spawning_and_expiry() {
    let store = MemoryStore::new();
    let cfg = config_with_spawning();
    let mut rng = StdRng::seed_from_u64(11);

    run_minutes(&store, &mut rng, &cfg, 0, 3 * DAY_MS);
    let events = store.market_events().unwrap();
    assert!(!events.is_empty());
    let now = 3 * DAY_MS;
    for e in &events {
        assert_eq!(e.expires_at - e.created_at, DAY_MS);
        // Expiry runs every minute, so nothing stale stays active
        if e.is_active {
            assert!(e.expires_at >= now - MINUTE_MS);
        }
    }
    assert!(events.iter().any(|e| !e.is_active));
}

#[test]
fn spawning_is_reproducible_for_a_seed() {
    let cfg = config_with_spawning();
    let run = |seed: u64| {
        let store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(seed);
        run_minutes(&store, &mut rng, &cfg, 0, DAY_MS);
        store
            .market_events()
            .unwrap()
            .into_iter()
            .map(|e| (e.scope, e.change_percent))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(77), run(77));
}

// ── Seasons ─────────────────────────────────────────────────────────────

#[test]
fn concurrent_openers_create_exactly_one_season() {
    for round in 0..20 {
        let store = Arc::new(MemoryStore::new());
        let cfg = SeasonConfig::default();
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let cfg = cfg.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine::ensure_active_season(store.as_ref(), round, &cfg).unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let seasons = store.seasons().unwrap();
        assert_eq!(seasons.len(), 1, "round {}", round);
        assert_eq!(seasons[0].season_number, 1);
        // Both callers see the same active season
        for r in results {
            assert_eq!(r.unwrap().season_number, 1);
        }
    }
}

#[test]
fn full_lifecycle_until_cap() {
    let store = MemoryStore::new();
    let cfg = EconomyConfig {
        seasons: SeasonConfig {
            max_seasons: 3,
            length_days: 2,
        },
        ..EconomyConfig::default()
    };
    let mut rng = StdRng::seed_from_u64(4);

    run_due(&store, &mut rng, 0, &cfg).unwrap();
    for p in 1..=20u64 {
        engine::join_season(&store, p, p as Millis).unwrap();
        engine::adjust_rating(&store, p, (p as i32) * 10).unwrap();
    }

    run_minutes(&store, &mut rng, &cfg, MINUTE_MS, 7 * DAY_MS);

    let seasons = store.seasons().unwrap();
    let numbers: Vec<u32> = seasons.iter().map(|s| s.season_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(seasons.iter().all(|s| s.status == SeasonStatus::Completed));
    assert!(store.active_season().unwrap().is_none());

    let first = &seasons[0];
    assert_eq!(first.total_players, 20);
    assert_eq!(first.top_player_id, Some(20));
    assert_eq!(first.top_rating, Some(1200));
    assert_eq!(seasons[1].total_players, 0);

    let rows = store.participations(1).unwrap();
    let tier_of = |player: u64| {
        rows.iter()
            .find(|r| r.player_id == player)
            .and_then(|r| r.reward_tier)
            .unwrap()
    };
    // 20 players: rank 1 = 5% platinum, rank 3 = 15% gold, ranks 4..=7 silver
    assert_eq!(tier_of(20), RewardTier::Platinum);
    assert_eq!(tier_of(18), RewardTier::Gold);
    assert_eq!(tier_of(17), RewardTier::Silver);
    assert_eq!(tier_of(14), RewardTier::Silver);
    assert_eq!(tier_of(13), RewardTier::Bronze);
    assert!(rows.iter().all(|r| r.current_rank.is_some()));

    // Past the cap nothing more happens
    let before = store.seasons().unwrap();
    run_due(&store, &mut rng, 30 * DAY_MS, &cfg).unwrap();
    assert_eq!(store.seasons().unwrap(), before);
}

#[test]
fn late_joiner_after_close_lands_in_next_season() {
    let store = MemoryStore::new();
    let cfg = SeasonConfig::default();
    engine::ensure_active_season(&store, 0, &cfg).unwrap();
    engine::join_season(&store, 1, 0).unwrap();
    engine::season_tick(&store, cfg.length_ms(), &cfg).unwrap();
    let row = engine::join_season(&store, 2, cfg.length_ms() + 1).unwrap();
    assert_eq!(row.season_number, 2);
    assert!(row.current_rank.is_none());
    assert!(row.reward_tier.is_none());
    assert_eq!(store.participations(1).unwrap().len(), 1);
}

#[test]
fn losing_closer_leaves_completed_season_and_ratings_alone() {
    let cfg = SeasonConfig::default();
    let end = cfg.length_ms();
    let hook_cfg = cfg.clone();
    let store = InterleavedStore::new(two_player_season(&cfg), move |inner| {
        // A rating change and a rival close, both after our snapshot
        engine::adjust_rating(inner, 1, 500).unwrap();
        engine::season_tick(inner, end, &hook_cfg).unwrap().unwrap();
    });

    assert!(engine::season_tick(&store, end, &cfg).unwrap().is_none());

    let seasons = store.seasons().unwrap();
    assert_eq!(seasons.len(), 2);
    assert_eq!(seasons[0].status, SeasonStatus::Completed);
    assert_eq!(seasons[0].top_player_id, Some(1));
    assert_eq!(seasons[0].top_rating, Some(1500));
    assert_eq!(seasons[0].total_players, 2);
    assert_eq!(seasons[1].status, SeasonStatus::Active);

    let rows = store.participations(1).unwrap();
    let p1 = rows.iter().find(|r| r.player_id == 1).unwrap();
    assert_eq!(p1.current_rating, 1500);
    assert_eq!(p1.current_rank, Some(1));
    let p2 = rows.iter().find(|r| r.player_id == 2).unwrap();
    assert_eq!(p2.current_rating, 1200);
    assert_eq!(p2.current_rank, Some(2));
}

#[test]
fn joiner_after_snapshot_is_not_ranked() {
    let cfg = SeasonConfig::default();
    let end = cfg.length_ms();
    let store = InterleavedStore::new(two_player_season(&cfg), move |inner| {
        inner
            .insert_participation(&SeasonParticipation::new(1, 9, end))
            .unwrap();
    });

    let close = engine::season_tick(&store, end, &cfg).unwrap().unwrap();
    assert_eq!(close.completed.total_players, 2);
    assert_eq!(close.standings.len(), 2);
    assert!(close.standings.iter().all(|s| s.player_id != 9));

    let rows = store.participations(1).unwrap();
    assert_eq!(rows.len(), 3);
    let late = rows.iter().find(|r| r.player_id == 9).unwrap();
    assert!(late.current_rank.is_none());
    assert!(late.reward_tier.is_none());
    assert!(rows
        .iter()
        .filter(|r| r.player_id != 9)
        .all(|r| r.current_rank.is_some() && r.reward_tier.is_some()));
    assert_eq!(store.seasons().unwrap()[0].total_players, 2);
}
