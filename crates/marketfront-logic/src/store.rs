//! Entity store boundary shared by every economy pass.
//!
//! [`EconomyStore`] is the only integration point between the subsystems.
//! It exposes typed create / read / filter / update calls per entity kind
//! plus the two guarantees the passes lean on:
//!
//! - conditional (compare-and-set) writes for demand records and the
//!   volatility singleton, so read-modify-write loops can retry instead of
//!   losing an update;
//! - a uniqueness guard in [`EconomyStore::insert_season`] that refuses a
//!   second active season or a reused season number;
//! - a one-way close: [`EconomyStore::complete_season_if_active`] succeeds
//!   for exactly one caller, and rank and rating writes touch disjoint
//!   fields so neither overwrites the other.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! headless harness. The SpacetimeDB module provides its own over tables.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::constants::Millis;
use crate::market_events::{EventDraft, MarketEvent};
use crate::pricing::DemandRecord;
use crate::scheduler::ScheduleMarks;
use crate::seasons::{self, RewardTier, Season, SeasonParticipation};
use crate::volatility::VolatilityState;
use crate::wagers::{Wager, WagerStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    /// A conditional write lost a race, or a uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The store could not be reached; retry on the next tick.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations the economy needs, per entity kind.
pub trait EconomyStore {
    // ── Demand ──
    /// Insert `default` unless a record with its key exists; return the stored record.
    fn upsert_demand(&self, default: DemandRecord) -> StoreResult<DemandRecord>;
    fn find_demand(&self, item_id: &str, item_type: &str) -> StoreResult<Option<DemandRecord>>;
    /// Replace the record only if it still equals `expected`.
    fn update_demand_if(&self, expected: &DemandRecord, next: &DemandRecord) -> StoreResult<()>;
    fn demand_records(&self) -> StoreResult<Vec<DemandRecord>>;

    // ── Volatility ──
    fn volatility(&self) -> StoreResult<Option<VolatilityState>>;
    /// Write the singleton if the current value equals `expected` (`None` = absent).
    fn put_volatility_if(
        &self,
        expected: Option<&VolatilityState>,
        next: &VolatilityState,
    ) -> StoreResult<()>;

    // ── Market events ──
    fn insert_event(&self, draft: EventDraft) -> StoreResult<MarketEvent>;
    fn update_event(&self, event: &MarketEvent) -> StoreResult<()>;
    /// All events, oldest first.
    fn market_events(&self) -> StoreResult<Vec<MarketEvent>>;
    /// The `limit` most recently created events, newest first.
    fn recent_events(&self, limit: usize) -> StoreResult<Vec<MarketEvent>>;

    // ── Wagers ──
    fn insert_wager(
        &self,
        challenger_id: u64,
        opponent_id: u64,
        stake: u64,
        now: Millis,
    ) -> StoreResult<Wager>;
    fn find_wager(&self, id: u64) -> StoreResult<Option<Wager>>;
    fn update_wager(&self, wager: &Wager) -> StoreResult<()>;
    /// The `limit` most recent wagers, newest first.
    fn recent_wagers(&self, limit: usize) -> StoreResult<Vec<Wager>>;

    // ── Seasons ──
    fn seasons(&self) -> StoreResult<Vec<Season>>;
    fn active_season(&self) -> StoreResult<Option<Season>>;
    /// Fails with `Conflict` if the number is taken, or if `season` is active
    /// while another active season exists.
    fn insert_season(&self, season: &Season) -> StoreResult<()>;
    /// Store `completed` over its season only while the stored row is still
    /// active. Fails with `Conflict` once another caller has closed it.
    fn complete_season_if_active(&self, completed: &Season) -> StoreResult<()>;

    // ── Participation ──
    /// Fails with `Conflict` if the player already joined that season.
    fn insert_participation(&self, row: &SeasonParticipation) -> StoreResult<()>;
    /// Rows for one season in insertion order.
    fn participations(&self, season_number: u32) -> StoreResult<Vec<SeasonParticipation>>;
    /// Write final rank and tier; the rating is left as stored.
    fn set_standing(
        &self,
        season_number: u32,
        player_id: u64,
        rank: u32,
        tier: RewardTier,
    ) -> StoreResult<()>;
    /// Add `delta` to a player's rating (floored at zero) in an active season.
    /// Fails with `Conflict` if the season has closed.
    fn add_rating(
        &self,
        season_number: u32,
        player_id: u64,
        delta: i32,
    ) -> StoreResult<SeasonParticipation>;

    // ── Worker bookkeeping ──
    fn schedule_marks(&self) -> StoreResult<ScheduleMarks>;
    fn put_schedule_marks(&self, marks: &ScheduleMarks) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct Tables {
    demand: BTreeMap<(String, String), DemandRecord>,
    volatility: Option<VolatilityState>,
    events: Vec<MarketEvent>,
    next_event_id: u64,
    wagers: Vec<Wager>,
    next_wager_id: u64,
    seasons: BTreeMap<u32, Season>,
    participations: Vec<SeasonParticipation>,
    marks: ScheduleMarks,
}

/// Thread-safe in-memory store. Every call holds one lock, which gives the
/// per-entity atomicity the trait requires.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut flag) = self.offline.lock() {
            *flag = offline;
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        let offline = self
            .offline
            .lock()
            .map(|f| *f)
            .map_err(|_| StoreError::Unavailable("offline flag poisoned".into()))?;
        if offline {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }
}

fn demand_key(item_id: &str, item_type: &str) -> (String, String) {
    (item_id.to_string(), item_type.to_string())
}

fn participation_mut(
    t: &mut Tables,
    season_number: u32,
    player_id: u64,
) -> StoreResult<&mut SeasonParticipation> {
    t.participations
        .iter_mut()
        .find(|p| p.season_number == season_number && p.player_id == player_id)
        .ok_or_else(|| {
            StoreError::NotFound(format!("player {} in season {}", player_id, season_number))
        })
}

impl EconomyStore for MemoryStore {
    fn upsert_demand(&self, default: DemandRecord) -> StoreResult<DemandRecord> {
        let mut t = self.lock()?;
        let key = demand_key(&default.item_id, &default.item_type);
        Ok(t.demand.entry(key).or_insert(default).clone())
    }

    fn find_demand(&self, item_id: &str, item_type: &str) -> StoreResult<Option<DemandRecord>> {
        let t = self.lock()?;
        Ok(t.demand.get(&demand_key(item_id, item_type)).cloned())
    }

    fn update_demand_if(&self, expected: &DemandRecord, next: &DemandRecord) -> StoreResult<()> {
        let mut t = self.lock()?;
        let key = demand_key(&expected.item_id, &expected.item_type);
        match t.demand.get_mut(&key) {
            None => Err(StoreError::NotFound(format!("demand {}/{}", key.0, key.1))),
            Some(current) if current != expected => Err(StoreError::Conflict(format!(
                "demand {}/{} changed",
                key.0, key.1
            ))),
            Some(current) => {
                *current = next.clone();
                Ok(())
            }
        }
    }

    fn demand_records(&self) -> StoreResult<Vec<DemandRecord>> {
        Ok(self.lock()?.demand.values().cloned().collect())
    }

    fn volatility(&self) -> StoreResult<Option<VolatilityState>> {
        Ok(self.lock()?.volatility.clone())
    }

    fn put_volatility_if(
        &self,
        expected: Option<&VolatilityState>,
        next: &VolatilityState,
    ) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.volatility.as_ref() != expected {
            return Err(StoreError::Conflict("volatility changed".into()));
        }
        t.volatility = Some(next.clone());
        Ok(())
    }

    fn insert_event(&self, draft: EventDraft) -> StoreResult<MarketEvent> {
        let mut t = self.lock()?;
        t.next_event_id += 1;
        let event = draft.into_event(t.next_event_id);
        t.events.push(event.clone());
        Ok(event)
    }

    fn update_event(&self, event: &MarketEvent) -> StoreResult<()> {
        let mut t = self.lock()?;
        match t.events.iter_mut().find(|e| e.id == event.id) {
            Some(slot) => {
                *slot = event.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("market event {}", event.id))),
        }
    }

    fn market_events(&self) -> StoreResult<Vec<MarketEvent>> {
        Ok(self.lock()?.events.clone())
    }

    fn recent_events(&self, limit: usize) -> StoreResult<Vec<MarketEvent>> {
        let t = self.lock()?;
        Ok(t.events.iter().rev().take(limit).cloned().collect())
    }

    fn insert_wager(
        &self,
        challenger_id: u64,
        opponent_id: u64,
        stake: u64,
        now: Millis,
    ) -> StoreResult<Wager> {
        let mut t = self.lock()?;
        t.next_wager_id += 1;
        let wager = Wager {
            id: t.next_wager_id,
            challenger_id,
            opponent_id,
            stake,
            status: WagerStatus::Pending,
            created_at: now,
        };
        t.wagers.push(wager.clone());
        Ok(wager)
    }

    fn find_wager(&self, id: u64) -> StoreResult<Option<Wager>> {
        Ok(self.lock()?.wagers.iter().find(|w| w.id == id).cloned())
    }

    fn update_wager(&self, wager: &Wager) -> StoreResult<()> {
        let mut t = self.lock()?;
        match t.wagers.iter_mut().find(|w| w.id == wager.id) {
            Some(slot) => {
                *slot = wager.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("wager {}", wager.id))),
        }
    }

    fn recent_wagers(&self, limit: usize) -> StoreResult<Vec<Wager>> {
        let t = self.lock()?;
        Ok(t.wagers.iter().rev().take(limit).cloned().collect())
    }

    fn seasons(&self) -> StoreResult<Vec<Season>> {
        Ok(self.lock()?.seasons.values().cloned().collect())
    }

    fn active_season(&self) -> StoreResult<Option<Season>> {
        Ok(self.lock()?.seasons.values().find(|s| s.is_active()).cloned())
    }

    fn insert_season(&self, season: &Season) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.seasons.contains_key(&season.season_number) {
            return Err(StoreError::Conflict(format!(
                "season {} already exists",
                season.season_number
            )));
        }
        if season.is_active() && t.seasons.values().any(|s| s.is_active()) {
            return Err(StoreError::Conflict("an active season already exists".into()));
        }
        t.seasons.insert(season.season_number, season.clone());
        Ok(())
    }

    fn complete_season_if_active(&self, completed: &Season) -> StoreResult<()> {
        let mut t = self.lock()?;
        let Some(slot) = t.seasons.get_mut(&completed.season_number) else {
            return Err(StoreError::NotFound(format!("season {}", completed.season_number)));
        };
        if !slot.is_active() {
            return Err(StoreError::Conflict(format!(
                "season {} already closed",
                completed.season_number
            )));
        }
        *slot = completed.clone();
        Ok(())
    }

    fn insert_participation(&self, row: &SeasonParticipation) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t
            .participations
            .iter()
            .any(|p| p.season_number == row.season_number && p.player_id == row.player_id)
        {
            return Err(StoreError::Conflict(format!(
                "player {} already in season {}",
                row.player_id, row.season_number
            )));
        }
        t.participations.push(row.clone());
        Ok(())
    }

    fn participations(&self, season_number: u32) -> StoreResult<Vec<SeasonParticipation>> {
        let t = self.lock()?;
        Ok(t.participations
            .iter()
            .filter(|p| p.season_number == season_number)
            .cloned()
            .collect())
    }

    fn set_standing(
        &self,
        season_number: u32,
        player_id: u64,
        rank: u32,
        tier: RewardTier,
    ) -> StoreResult<()> {
        let mut t = self.lock()?;
        let slot = participation_mut(&mut t, season_number, player_id)?;
        slot.current_rank = Some(rank);
        slot.reward_tier = Some(tier);
        Ok(())
    }

    fn add_rating(
        &self,
        season_number: u32,
        player_id: u64,
        delta: i32,
    ) -> StoreResult<SeasonParticipation> {
        let mut t = self.lock()?;
        if !t.seasons.get(&season_number).is_some_and(|s| s.is_active()) {
            return Err(StoreError::Conflict(format!(
                "season {} is not active",
                season_number
            )));
        }
        let slot = participation_mut(&mut t, season_number, player_id)?;
        slot.current_rating = seasons::adjusted_rating(slot.current_rating, delta);
        Ok(slot.clone())
    }

    fn schedule_marks(&self) -> StoreResult<ScheduleMarks> {
        Ok(self.lock()?.marks.clone())
    }

    fn put_schedule_marks(&self, marks: &ScheduleMarks) -> StoreResult<()> {
        self.lock()?.marks = marks.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeasonConfig;
    use crate::seasons::plan_next_season;

    #[test]
    fn test_upsert_keeps_first_base_price() {
        let store = MemoryStore::new();
        let a = store.upsert_demand(DemandRecord::new("axe", "tool", 10, 0)).unwrap();
        let b = store.upsert_demand(DemandRecord::new("axe", "tool", 99, 5)).unwrap();
        assert_eq!(a.base_price, 10);
        assert_eq!(b.base_price, 10);
        assert_eq!(store.demand_records().unwrap().len(), 1);
    }

    #[test]
    fn test_same_item_different_type_is_separate() {
        let store = MemoryStore::new();
        store.upsert_demand(DemandRecord::new("axe", "tool", 10, 0)).unwrap();
        store.upsert_demand(DemandRecord::new("axe", "weapon", 30, 0)).unwrap();
        assert_eq!(store.demand_records().unwrap().len(), 2);
    }

    #[test]
    fn test_demand_compare_and_set() {
        let store = MemoryStore::new();
        let original = store.upsert_demand(DemandRecord::new("axe", "tool", 10, 0)).unwrap();
        let mut next = original.clone();
        next.current_price = 12;
        store.update_demand_if(&original, &next).unwrap();
        // Stale expectation now loses
        let mut stale = original.clone();
        stale.current_price = 13;
        assert!(matches!(
            store.update_demand_if(&original, &stale),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.find_demand("axe", "tool").unwrap().unwrap().current_price, 12);
    }

    #[test]
    fn test_volatility_create_once() {
        let store = MemoryStore::new();
        let s = VolatilityState::initial(0);
        store.put_volatility_if(None, &s).unwrap();
        assert!(matches!(
            store.put_volatility_if(None, &s),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_second_active_season_rejected() {
        let store = MemoryStore::new();
        let cfg = SeasonConfig::default();
        let s1 = plan_next_season(0, 0, &cfg).unwrap();
        store.insert_season(&s1).unwrap();
        let s2 = plan_next_season(1, 0, &cfg).unwrap();
        assert!(matches!(store.insert_season(&s2), Err(StoreError::Conflict(_))));
        assert!(matches!(store.insert_season(&s1), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert_wager(1, 2, 10, i).unwrap();
        }
        let ids: Vec<u64> = store.recent_wagers(3).unwrap().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn test_duplicate_participation_rejected() {
        let store = MemoryStore::new();
        let row = SeasonParticipation::new(1, 7, 0);
        store.insert_participation(&row).unwrap();
        assert!(matches!(
            store.insert_participation(&row),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_season_closes_once() {
        let store = MemoryStore::new();
        let s1 = plan_next_season(0, 0, &SeasonConfig::default()).unwrap();
        store.insert_season(&s1).unwrap();
        let closed = crate::seasons::completed_season(&s1, &[]);
        store.complete_season_if_active(&closed).unwrap();
        assert!(matches!(
            store.complete_season_if_active(&closed),
            Err(StoreError::Conflict(_))
        ));
        let mut missing = closed.clone();
        missing.season_number = 9;
        assert!(matches!(
            store.complete_season_if_active(&missing),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_standing_and_rating_writes_do_not_clobber() {
        let store = MemoryStore::new();
        let s1 = plan_next_season(0, 0, &SeasonConfig::default()).unwrap();
        store.insert_season(&s1).unwrap();
        store.insert_participation(&SeasonParticipation::new(1, 7, 0)).unwrap();

        store.add_rating(1, 7, 200).unwrap();
        store.set_standing(1, 7, 1, RewardTier::Diamond).unwrap();
        let row = store.add_rating(1, 7, -5000).unwrap();
        assert_eq!(row.current_rating, 0);
        assert_eq!(row.current_rank, Some(1));
        assert_eq!(row.reward_tier, Some(RewardTier::Diamond));

        assert!(matches!(
            store.set_standing(1, 8, 2, RewardTier::Gold),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_rating_frozen_after_close() {
        let store = MemoryStore::new();
        let s1 = plan_next_season(0, 0, &SeasonConfig::default()).unwrap();
        store.insert_season(&s1).unwrap();
        store.insert_participation(&SeasonParticipation::new(1, 7, 0)).unwrap();
        store
            .complete_season_if_active(&crate::seasons::completed_season(&s1, &[]))
            .unwrap();
        assert!(matches!(store.add_rating(1, 7, 25), Err(StoreError::Conflict(_))));
        assert_eq!(store.participations(1).unwrap()[0].current_rating, 1000);
    }

    #[test]
    fn test_offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(store.seasons(), Err(StoreError::Unavailable(_))));
        store.set_offline(false);
        assert!(store.seasons().is_ok());
    }
}
