//! [`EconomyStore`] over the module's tables.
//!
//! A reducer is one serializable transaction, so compare-and-set here only
//! fails when the row genuinely differs from what the caller read.

use marketfront_logic::constants::Millis;
use marketfront_logic::market_events::{EventDraft, MarketEvent};
use marketfront_logic::pricing::{demand_key, DemandRecord, DemandTrend};
use marketfront_logic::scheduler::ScheduleMarks;
use marketfront_logic::seasons::{
    self, RewardPool, RewardTier, Season, SeasonParticipation, SeasonStatus,
};
use marketfront_logic::sectors::{EventScope, Sector};
use marketfront_logic::store::{EconomyStore, StoreError, StoreResult};
use marketfront_logic::volatility::{VolatilityState, VolatilityTrend};
use marketfront_logic::wagers::{Wager, WagerStatus};
use spacetimedb::{ReducerContext, Table};

use crate::tables::*;

pub struct ModuleStore<'a> {
    ctx: &'a ReducerContext,
}

impl<'a> ModuleStore<'a> {
    pub fn new(ctx: &'a ReducerContext) -> Self {
        Self { ctx }
    }
}

// ============================================================================
// ROW CONVERSIONS
// ============================================================================

fn demand_from_row(row: DemandRow) -> DemandRecord {
    DemandRecord {
        item_id: row.item_id,
        item_type: row.item_type,
        base_price: row.base_price,
        current_price: row.current_price,
        total_purchases: row.total_purchases,
        purchases_in_window: row.purchases_in_window,
        demand_score: row.demand_score,
        trend: DemandTrend::from_u8(row.trend),
        last_update: row.last_update,
    }
}

fn demand_to_row(id: u64, rec: &DemandRecord) -> DemandRow {
    DemandRow {
        id,
        item_key: demand_key(&rec.item_id, &rec.item_type),
        item_id: rec.item_id.clone(),
        item_type: rec.item_type.clone(),
        base_price: rec.base_price,
        current_price: rec.current_price,
        total_purchases: rec.total_purchases,
        purchases_in_window: rec.purchases_in_window,
        demand_score: rec.demand_score,
        trend: rec.trend.to_u8(),
        last_update: rec.last_update,
    }
}

fn volatility_from_row(row: VolatilityRow) -> VolatilityState {
    VolatilityState {
        index: row.index,
        trend: VolatilityTrend::from_u8(row.trend),
        difficulty_multiplier: row.difficulty_multiplier,
        reward_multiplier: row.reward_multiplier,
        last_update: row.last_update,
    }
}

fn volatility_to_row(state: &VolatilityState) -> VolatilityRow {
    VolatilityRow {
        id: 0,
        index: state.index,
        trend: state.trend.to_u8(),
        difficulty_multiplier: state.difficulty_multiplier,
        reward_multiplier: state.reward_multiplier,
        last_update: state.last_update,
    }
}

fn event_from_row(row: MarketEventRow) -> MarketEvent {
    // Rows are only written from EventScope labels; anything else is treated
    // as the default sector rather than dropped.
    let scope = EventScope::from_label(&row.sector).unwrap_or(EventScope::Sector(Sector::DEFAULT));
    MarketEvent {
        id: row.id,
        scope,
        change_percent: row.change_percent,
        message: row.message,
        is_active: row.is_active,
        created_at: row.created_at,
        expires_at: row.expires_at,
    }
}

fn event_to_row(event: &MarketEvent) -> MarketEventRow {
    MarketEventRow {
        id: event.id,
        sector: event.scope.label().to_string(),
        change_percent: event.change_percent,
        message: event.message.clone(),
        is_active: event.is_active,
        created_at: event.created_at,
        expires_at: event.expires_at,
    }
}

fn wager_from_row(row: WagerRow) -> Wager {
    Wager {
        id: row.id,
        challenger_id: row.challenger_id,
        opponent_id: row.opponent_id,
        stake: row.stake,
        status: WagerStatus::from_u8(row.status),
        created_at: row.created_at,
    }
}

fn wager_to_row(w: &Wager) -> WagerRow {
    WagerRow {
        id: w.id,
        challenger_id: w.challenger_id,
        opponent_id: w.opponent_id,
        stake: w.stake,
        status: w.status.to_u8(),
        created_at: w.created_at,
    }
}

fn season_from_row(row: SeasonRow) -> Season {
    Season {
        season_number: row.season_number,
        status: SeasonStatus::from_u8(row.status),
        start_date: row.start_date,
        end_date: row.end_date,
        total_players: row.total_players,
        reward_pool: RewardPool {
            coins: row.reward_coins,
            gems: row.reward_gems,
            cosmetic: row.reward_cosmetic,
        },
        top_player_id: row.top_player_id,
        top_rating: row.top_rating,
    }
}

fn season_to_row(s: &Season) -> SeasonRow {
    SeasonRow {
        season_number: s.season_number,
        status: s.status.to_u8(),
        start_date: s.start_date,
        end_date: s.end_date,
        total_players: s.total_players,
        reward_coins: s.reward_pool.coins,
        reward_gems: s.reward_pool.gems,
        reward_cosmetic: s.reward_pool.cosmetic.clone(),
        top_player_id: s.top_player_id,
        top_rating: s.top_rating,
    }
}

fn participation_from_row(row: ParticipationRow) -> SeasonParticipation {
    SeasonParticipation {
        season_number: row.season_number,
        player_id: row.player_id,
        current_rating: row.current_rating,
        current_rank: row.current_rank,
        reward_tier: row.reward_tier.map(RewardTier::from_u8),
        joined_at: row.joined_at,
    }
}

fn participation_to_row(id: u64, p: &SeasonParticipation) -> ParticipationRow {
    ParticipationRow {
        id,
        season_number: p.season_number,
        player_id: p.player_id,
        current_rating: p.current_rating,
        current_rank: p.current_rank,
        reward_tier: p.reward_tier.map(RewardTier::to_u8),
        joined_at: p.joined_at,
    }
}

// ============================================================================
// STORE
// ============================================================================

impl ModuleStore<'_> {
    fn demand_row(&self, item_id: &str, item_type: &str) -> Option<DemandRow> {
        self.ctx
            .db
            .demand_record()
            .item_key()
            .find(demand_key(item_id, item_type))
    }

    fn participation_row(&self, season_number: u32, player_id: u64) -> Option<ParticipationRow> {
        self.ctx
            .db
            .season_participation()
            .iter()
            .find(|p| p.season_number == season_number && p.player_id == player_id)
    }

    fn require_participation(
        &self,
        season_number: u32,
        player_id: u64,
    ) -> StoreResult<ParticipationRow> {
        self.participation_row(season_number, player_id).ok_or_else(|| {
            StoreError::NotFound(format!("player {} in season {}", player_id, season_number))
        })
    }
}

impl EconomyStore for ModuleStore<'_> {
    fn upsert_demand(&self, default: DemandRecord) -> StoreResult<DemandRecord> {
        if let Some(row) = self.demand_row(&default.item_id, &default.item_type) {
            return Ok(demand_from_row(row));
        }
        let row = self.ctx.db.demand_record().insert(demand_to_row(0, &default));
        Ok(demand_from_row(row))
    }

    fn find_demand(&self, item_id: &str, item_type: &str) -> StoreResult<Option<DemandRecord>> {
        Ok(self.demand_row(item_id, item_type).map(demand_from_row))
    }

    fn update_demand_if(&self, expected: &DemandRecord, next: &DemandRecord) -> StoreResult<()> {
        let Some(row) = self.demand_row(&expected.item_id, &expected.item_type) else {
            return Err(StoreError::NotFound(demand_key(&expected.item_id, &expected.item_type)));
        };
        let id = row.id;
        if demand_from_row(row) != *expected {
            return Err(StoreError::Conflict(format!(
                "demand {} changed",
                demand_key(&expected.item_id, &expected.item_type)
            )));
        }
        self.ctx.db.demand_record().id().update(demand_to_row(id, next));
        Ok(())
    }

    fn demand_records(&self) -> StoreResult<Vec<DemandRecord>> {
        let mut rows: Vec<DemandRow> = self.ctx.db.demand_record().iter().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows.into_iter().map(demand_from_row).collect())
    }

    fn volatility(&self) -> StoreResult<Option<VolatilityState>> {
        Ok(self.ctx.db.volatility_state().id().find(0).map(volatility_from_row))
    }

    fn put_volatility_if(
        &self,
        expected: Option<&VolatilityState>,
        next: &VolatilityState,
    ) -> StoreResult<()> {
        let current = self.volatility()?;
        if current.as_ref() != expected {
            return Err(StoreError::Conflict("volatility changed".into()));
        }
        let row = volatility_to_row(next);
        if current.is_some() {
            self.ctx.db.volatility_state().id().update(row);
        } else {
            self.ctx.db.volatility_state().insert(row);
        }
        Ok(())
    }

    fn insert_event(&self, draft: EventDraft) -> StoreResult<MarketEvent> {
        // id 0 is replaced by auto_inc
        let row = self.ctx.db.market_event().insert(event_to_row(&draft.into_event(0)));
        Ok(event_from_row(row))
    }

    fn update_event(&self, event: &MarketEvent) -> StoreResult<()> {
        if self.ctx.db.market_event().id().find(event.id).is_none() {
            return Err(StoreError::NotFound(format!("market event {}", event.id)));
        }
        self.ctx.db.market_event().id().update(event_to_row(event));
        Ok(())
    }

    fn market_events(&self) -> StoreResult<Vec<MarketEvent>> {
        let mut rows: Vec<MarketEventRow> = self.ctx.db.market_event().iter().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows.into_iter().map(event_from_row).collect())
    }

    fn recent_events(&self, limit: usize) -> StoreResult<Vec<MarketEvent>> {
        let mut events = self.market_events()?;
        events.reverse();
        events.truncate(limit);
        Ok(events)
    }

    fn insert_wager(
        &self,
        challenger_id: u64,
        opponent_id: u64,
        stake: u64,
        now: Millis,
    ) -> StoreResult<Wager> {
        let row = self.ctx.db.wager().insert(WagerRow {
            id: 0,
            challenger_id,
            opponent_id,
            stake,
            status: WagerStatus::Pending.to_u8(),
            created_at: now,
        });
        Ok(wager_from_row(row))
    }

    fn find_wager(&self, id: u64) -> StoreResult<Option<Wager>> {
        Ok(self.ctx.db.wager().id().find(id).map(wager_from_row))
    }

    fn update_wager(&self, wager: &Wager) -> StoreResult<()> {
        if self.ctx.db.wager().id().find(wager.id).is_none() {
            return Err(StoreError::NotFound(format!("wager {}", wager.id)));
        }
        self.ctx.db.wager().id().update(wager_to_row(wager));
        Ok(())
    }

    fn recent_wagers(&self, limit: usize) -> StoreResult<Vec<Wager>> {
        let mut rows: Vec<WagerRow> = self.ctx.db.wager().iter().collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.id));
        rows.truncate(limit);
        Ok(rows.into_iter().map(wager_from_row).collect())
    }

    fn seasons(&self) -> StoreResult<Vec<Season>> {
        let mut rows: Vec<SeasonRow> = self.ctx.db.season().iter().collect();
        rows.sort_by_key(|r| r.season_number);
        Ok(rows.into_iter().map(season_from_row).collect())
    }

    fn active_season(&self) -> StoreResult<Option<Season>> {
        let active = SeasonStatus::Active.to_u8();
        Ok(self
            .ctx
            .db
            .season()
            .iter()
            .find(|s| s.status == active)
            .map(season_from_row))
    }

    fn insert_season(&self, season: &Season) -> StoreResult<()> {
        if self.ctx.db.season().season_number().find(season.season_number).is_some() {
            return Err(StoreError::Conflict(format!(
                "season {} already exists",
                season.season_number
            )));
        }
        if season.is_active() && self.active_season()?.is_some() {
            return Err(StoreError::Conflict("an active season already exists".into()));
        }
        self.ctx.db.season().insert(season_to_row(season));
        Ok(())
    }

    fn complete_season_if_active(&self, completed: &Season) -> StoreResult<()> {
        let Some(stored) = self.ctx.db.season().season_number().find(completed.season_number)
        else {
            return Err(StoreError::NotFound(format!("season {}", completed.season_number)));
        };
        if stored.status != SeasonStatus::Active.to_u8() {
            return Err(StoreError::Conflict(format!(
                "season {} already closed",
                completed.season_number
            )));
        }
        self.ctx.db.season().season_number().update(season_to_row(completed));
        Ok(())
    }

    fn insert_participation(&self, row: &SeasonParticipation) -> StoreResult<()> {
        if self.participation_row(row.season_number, row.player_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "player {} already in season {}",
                row.player_id, row.season_number
            )));
        }
        self.ctx
            .db
            .season_participation()
            .insert(participation_to_row(0, row));
        Ok(())
    }

    fn participations(&self, season_number: u32) -> StoreResult<Vec<SeasonParticipation>> {
        let mut rows: Vec<ParticipationRow> = self
            .ctx
            .db
            .season_participation()
            .iter()
            .filter(|p| p.season_number == season_number)
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows.into_iter().map(participation_from_row).collect())
    }

    fn set_standing(
        &self,
        season_number: u32,
        player_id: u64,
        rank: u32,
        tier: RewardTier,
    ) -> StoreResult<()> {
        let row = self.require_participation(season_number, player_id)?;
        self.ctx.db.season_participation().id().update(ParticipationRow {
            current_rank: Some(rank),
            reward_tier: Some(tier.to_u8()),
            ..row
        });
        Ok(())
    }

    fn add_rating(
        &self,
        season_number: u32,
        player_id: u64,
        delta: i32,
    ) -> StoreResult<SeasonParticipation> {
        let active = SeasonStatus::Active.to_u8();
        if !self
            .ctx
            .db
            .season()
            .season_number()
            .find(season_number)
            .is_some_and(|s| s.status == active)
        {
            return Err(StoreError::Conflict(format!(
                "season {} is not active",
                season_number
            )));
        }
        let row = self.require_participation(season_number, player_id)?;
        let updated = self.ctx.db.season_participation().id().update(ParticipationRow {
            current_rating: seasons::adjusted_rating(row.current_rating, delta),
            ..row
        });
        Ok(participation_from_row(updated))
    }

    fn schedule_marks(&self) -> StoreResult<ScheduleMarks> {
        Ok(self
            .ctx
            .db
            .economy_clock()
            .id()
            .find(0)
            .map(|c| ScheduleMarks {
                last_decay: c.last_decay,
                last_volatility: c.last_volatility,
                last_season: c.last_season,
                last_spawn: c.last_spawn,
            })
            .unwrap_or_default())
    }

    fn put_schedule_marks(&self, marks: &ScheduleMarks) -> StoreResult<()> {
        let row = EconomyClock {
            id: 0,
            last_decay: marks.last_decay,
            last_volatility: marks.last_volatility,
            last_season: marks.last_season,
            last_spawn: marks.last_spawn,
        };
        if self.ctx.db.economy_clock().id().find(0).is_some() {
            self.ctx.db.economy_clock().id().update(row);
        } else {
            self.ctx.db.economy_clock().insert(row);
        }
        Ok(())
    }
}
