//! Economy operations over an [`EconomyStore`].
//!
//! Each function is one short read-modify-write pass. Demand and volatility
//! writes go through compare-and-set and retry a few times on conflict;
//! sweeps commit one entity at a time, so a pass abandoned midway leaves
//! every committed write valid. The passes are what the scheduled worker and
//! the client-facing reducers call.

use rand::Rng;
use thiserror::Error;

use crate::config::{DemandConfig, MarketEventConfig, SeasonConfig};
use crate::constants::{seasons::WAGER_RATING_STEP, volatility as vol, Millis};
use crate::market_events::{self, MarketEvent};
use crate::pricing::{self, DemandRecord};
use crate::seasons::{self, Season, SeasonParticipation, Standing};
use crate::store::{EconomyStore, StoreError, StoreResult};
use crate::volatility::{self, ActivitySignals, VolatilityState};
use crate::wagers::{self, Wager, WagerRejection};

/// Attempts made by a compare-and-set loop before giving up.
pub const MAX_CAS_ATTEMPTS: usize = 8;

// ============================================================================
// DEMAND PRICING
// ============================================================================

/// Current price for an item, creating its record at `base_price` if absent.
pub fn get_price<S: EconomyStore + ?Sized>(
    store: &S,
    item_id: &str,
    item_type: &str,
    base_price: u64,
    now: Millis,
) -> StoreResult<u64> {
    let rec = store.upsert_demand(DemandRecord::new(item_id, item_type, base_price, now))?;
    Ok(rec.current_price)
}

/// Register a purchase. Returns the updated record, or `None` when the item
/// has never been priced (there is no base price to derive from).
pub fn record_purchase<S: EconomyStore + ?Sized>(
    store: &S,
    item_id: &str,
    item_type: &str,
    now: Millis,
) -> StoreResult<Option<DemandRecord>> {
    for _ in 0..MAX_CAS_ATTEMPTS {
        let Some(current) = store.find_demand(item_id, item_type)? else {
            log::warn!("Purchase of unpriced item {}/{} ignored", item_id, item_type);
            return Ok(None);
        };
        let mut next = current.clone();
        pricing::apply_purchase(&mut next, now);
        match store.update_demand_if(&current, &next) {
            Ok(()) => {
                log::debug!(
                    "Purchase {}/{}: score={} price={} -> {}",
                    item_id,
                    item_type,
                    next.demand_score,
                    current.current_price,
                    next.current_price
                );
                return Ok(Some(next));
            }
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(StoreError::Conflict(format!(
        "demand {}/{} kept changing",
        item_id, item_type
    )))
}

/// Relax every record idle for a full window. Returns how many changed.
pub fn decay_pass<S: EconomyStore + ?Sized>(
    store: &S,
    now: Millis,
    cfg: &DemandConfig,
) -> StoreResult<usize> {
    let mut decayed = 0;
    for current in store.demand_records()? {
        let mut next = current.clone();
        if !pricing::apply_decay(&mut next, now, cfg.window_ms) {
            continue;
        }
        match store.update_demand_if(&current, &next) {
            Ok(()) => decayed += 1,
            // A concurrent purchase refreshed it; it is no longer due.
            Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }
    if decayed > 0 {
        log::info!("Demand decay: {} records relaxed", decayed);
    }
    Ok(decayed)
}

/// Base price scaled by the active events covering `ticker`.
pub fn effective_price<S: EconomyStore + ?Sized>(
    store: &S,
    ticker: &str,
    base_price: f64,
) -> StoreResult<f64> {
    Ok(pricing::effective_price(
        ticker,
        base_price,
        &active_events(store)?,
    ))
}

// ============================================================================
// VOLATILITY
// ============================================================================

/// Fetch the volatility singleton, creating it on first use.
pub fn current_volatility<S: EconomyStore + ?Sized>(
    store: &S,
    now: Millis,
) -> StoreResult<VolatilityState> {
    if let Some(state) = store.volatility()? {
        return Ok(state);
    }
    let initial = VolatilityState::initial(now);
    match store.put_volatility_if(None, &initial) {
        Ok(()) => Ok(initial),
        // Someone else created it first
        Err(StoreError::Conflict(_)) => store
            .volatility()?
            .ok_or_else(|| StoreError::NotFound("volatility".into())),
        Err(e) => Err(e),
    }
}

/// Sample recent wagers and events for a volatility tick.
pub fn sample_signals<S: EconomyStore + ?Sized>(store: &S) -> StoreResult<ActivitySignals> {
    let wagers = store.recent_wagers(vol::WAGER_SAMPLE)?;
    let events = store.recent_events(vol::EVENT_SAMPLE)?;
    Ok(ActivitySignals {
        recent_accepted_wagers: wagers::count_accepted(&wagers),
        recent_active_events: events.iter().filter(|e| e.is_active).count(),
    })
}

/// Advance the volatility index one step.
pub fn volatility_tick<S: EconomyStore + ?Sized>(
    store: &S,
    now: Millis,
) -> StoreResult<VolatilityState> {
    let signals = sample_signals(store)?;
    for _ in 0..MAX_CAS_ATTEMPTS {
        let prev = current_volatility(store, now)?;
        let next = volatility::tick(&prev, &signals, now);
        match store.put_volatility_if(Some(&prev), &next) {
            Ok(()) => {
                if next.trend != prev.trend {
                    log::info!(
                        "Volatility {:.0} -> {:.0} ({:?})",
                        prev.index,
                        next.index,
                        next.trend
                    );
                }
                return Ok(next);
            }
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(StoreError::Conflict("volatility kept changing".into()))
}

// ============================================================================
// MARKET EVENTS
// ============================================================================

/// Roll and store a batch of events.
pub fn spawn_pass<S: EconomyStore + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    now: Millis,
    cfg: &MarketEventConfig,
) -> StoreResult<Vec<MarketEvent>> {
    let mut spawned = Vec::new();
    for draft in market_events::roll_events(rng, now, cfg) {
        let event = store.insert_event(draft)?;
        log::info!("Market event {}: {}", event.id, event.message);
        spawned.push(event);
    }
    Ok(spawned)
}

/// Switch off every expired event. Returns how many changed.
pub fn expire_pass<S: EconomyStore + ?Sized>(store: &S, now: Millis) -> StoreResult<usize> {
    let mut expired = 0;
    for mut event in store.market_events()? {
        if market_events::expire(&mut event, now) {
            store.update_event(&event)?;
            expired += 1;
        }
    }
    if expired > 0 {
        log::info!("Expired {} market events", expired);
    }
    Ok(expired)
}

pub fn active_events<S: EconomyStore + ?Sized>(store: &S) -> StoreResult<Vec<MarketEvent>> {
    Ok(store
        .market_events()?
        .into_iter()
        .filter(|e| e.is_active)
        .collect())
}

// ============================================================================
// SEASONS
// ============================================================================

/// Make sure a season is active, opening the next one if needed.
///
/// Returns the active season, or `None` once the season cap is exhausted.
/// When a concurrent caller opens the season first, the store's uniqueness
/// guard rejects this insert and the winner's season is returned instead.
pub fn ensure_active_season<S: EconomyStore + ?Sized>(
    store: &S,
    now: Millis,
    cfg: &SeasonConfig,
) -> StoreResult<Option<Season>> {
    if let Some(active) = store.active_season()? {
        return Ok(Some(active));
    }
    let last = seasons::last_season_number(&store.seasons()?);
    let Some(season) = seasons::plan_next_season(last, now, cfg) else {
        log::debug!("Season cap {} reached; no new season", cfg.max_seasons);
        return Ok(None);
    };
    match store.insert_season(&season) {
        Ok(()) => {
            log::info!(
                "Season {} opened, ends at {} (pool {} coins, {} gems)",
                season.season_number,
                season.end_date,
                season.reward_pool.coins,
                season.reward_pool.gems
            );
            Ok(Some(season))
        }
        Err(StoreError::Conflict(reason)) => {
            log::debug!("Season open lost a race: {}", reason);
            store.active_season()
        }
        Err(e) => Err(e),
    }
}

/// Outcome of closing a season.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonClose {
    pub completed: Season,
    pub standings: Vec<Standing>,
    /// The successor, if the cap allowed one.
    pub next: Option<Season>,
}

/// Close `season` if its window has elapsed, then open its successor.
///
/// Ranking uses the participation rows read at the start; rows added after
/// that read are not ranked. The close is claimed before any standing is
/// written, so when two callers race only the winner ranks and the other
/// returns `None`.
pub fn close_if_expired<S: EconomyStore + ?Sized>(
    store: &S,
    season: &Season,
    now: Millis,
    cfg: &SeasonConfig,
) -> StoreResult<Option<SeasonClose>> {
    if !season.is_active() || !season.is_expired(now) {
        return Ok(None);
    }
    let snapshot = store.participations(season.season_number)?;
    let standings = seasons::rank_participants(&snapshot);
    let completed = seasons::completed_season(season, &standings);

    match store.complete_season_if_active(&completed) {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => {
            log::debug!("Season {} already closed elsewhere", season.season_number);
            return Ok(None);
        }
        Err(e) => return Err(e),
    }

    for standing in &standings {
        store.set_standing(
            season.season_number,
            standing.player_id,
            standing.rank,
            standing.tier,
        )?;
    }
    log::info!(
        "Season {} closed: {} players, top {:?} ({:?})",
        completed.season_number,
        completed.total_players,
        completed.top_player_id,
        completed.top_rating
    );

    let next = ensure_active_season(store, now, cfg)?;
    Ok(Some(SeasonClose {
        completed,
        standings,
        next,
    }))
}

/// Periodic season check: open a season if none is active, close it if due.
pub fn season_tick<S: EconomyStore + ?Sized>(
    store: &S,
    now: Millis,
    cfg: &SeasonConfig,
) -> StoreResult<Option<SeasonClose>> {
    match ensure_active_season(store, now, cfg)? {
        Some(active) => close_if_expired(store, &active, now, cfg),
        None => Ok(None),
    }
}

/// Enter the active season at the starting rating.
pub fn join_season<S: EconomyStore + ?Sized>(
    store: &S,
    player_id: u64,
    now: Millis,
) -> StoreResult<SeasonParticipation> {
    let season = store
        .active_season()?
        .ok_or_else(|| StoreError::NotFound("active season".into()))?;
    let row = SeasonParticipation::new(season.season_number, player_id, now);
    store.insert_participation(&row)?;
    log::info!("Player {} joined season {}", player_id, season.season_number);
    Ok(row)
}

/// Apply a rating change to a player's entry in the active season.
/// Ratings never drop below zero and freeze once the season closes.
pub fn adjust_rating<S: EconomyStore + ?Sized>(
    store: &S,
    player_id: u64,
    delta: i32,
) -> StoreResult<SeasonParticipation> {
    let season = store
        .active_season()?
        .ok_or_else(|| StoreError::NotFound("active season".into()))?;
    store.add_rating(season.season_number, player_id, delta)
}

// ============================================================================
// WAGERS
// ============================================================================

#[derive(Debug, Error)]
pub enum WagerError {
    #[error(transparent)]
    Rejected(#[from] WagerRejection),
    #[error("unknown wager {0}")]
    Unknown(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn load_wager<S: EconomyStore + ?Sized>(store: &S, wager_id: u64) -> Result<Wager, WagerError> {
    store.find_wager(wager_id)?.ok_or(WagerError::Unknown(wager_id))
}

pub fn place_wager<S: EconomyStore + ?Sized>(
    store: &S,
    challenger_id: u64,
    opponent_id: u64,
    stake: u64,
    now: Millis,
) -> Result<Wager, WagerError> {
    wagers::validate_new(challenger_id, opponent_id, stake)?;
    let wager = store.insert_wager(challenger_id, opponent_id, stake, now)?;
    log::info!(
        "Wager {}: player {} challenges {} for {}",
        wager.id,
        challenger_id,
        opponent_id,
        stake
    );
    Ok(wager)
}

pub fn respond_to_wager<S: EconomyStore + ?Sized>(
    store: &S,
    wager_id: u64,
    responder_id: u64,
    accept: bool,
) -> Result<Wager, WagerError> {
    let mut wager = load_wager(store, wager_id)?;
    wagers::respond(&mut wager, responder_id, accept)?;
    store.update_wager(&wager)?;
    Ok(wager)
}

/// Settle an accepted wager in favour of `winner_id`.
///
/// If both players are in the active season the winner gains and the loser
/// drops [`WAGER_RATING_STEP`]; players outside the season are skipped.
pub fn settle_wager<S: EconomyStore + ?Sized>(
    store: &S,
    wager_id: u64,
    caller_id: u64,
    winner_id: u64,
) -> Result<Wager, WagerError> {
    let mut wager = load_wager(store, wager_id)?;
    let loser_id =
        wagers::counterparty(&wager, winner_id).ok_or(WagerRejection::NotParticipant)?;
    wagers::settle(&mut wager, caller_id)?;
    store.update_wager(&wager)?;

    for (player, delta) in [(winner_id, WAGER_RATING_STEP), (loser_id, -WAGER_RATING_STEP)] {
        match adjust_rating(store, player, delta) {
            // Not in the season, or the season closed underneath us
            Ok(_) | Err(StoreError::NotFound(_)) | Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    log::info!("Wager {} settled, winner {}", wager.id, winner_id);
    Ok(wager)
}
