//! SpacetimeDB table definitions for the MarketFront economy.
//!
//! Each table mirrors one entity from `marketfront-logic`, flattened to
//! columns SpacetimeDB can store: enums become `u8` IDs (see
//! `marketfront_logic::constants`), timestamps are epoch milliseconds.
//! Conversions live in [`crate::store`].

use spacetimedb::{table, Identity, ScheduleAt, Timestamp};

use crate::simulation::economy_tick;

// ============================================================================
// CONFIGURATION & WORKER
// ============================================================================

/// Economy configuration singleton (id always 0)
#[table(name = economy_config, public)]
#[derive(Clone)]
pub struct EconomyConfigRow {
    #[primary_key]
    pub id: u32,
    /// `EconomyConfig` as JSON; unknown or missing fields fall back to defaults
    pub json: String,
    pub paused: bool,
}

/// Last-run marks of the periodic passes (id always 0)
#[table(name = economy_clock)]
#[derive(Clone)]
pub struct EconomyClock {
    #[primary_key]
    pub id: u32,
    pub last_decay: Option<i64>,
    pub last_volatility: Option<i64>,
    pub last_season: Option<i64>,
    pub last_spawn: Option<i64>,
}

/// Timer row driving `economy_tick`
#[table(name = economy_schedule, scheduled(economy_tick))]
pub struct EconomySchedule {
    #[primary_key]
    #[auto_inc]
    pub scheduled_id: u64,
    pub scheduled_at: ScheduleAt,
}

// ============================================================================
// PLAYERS
// ============================================================================

/// Stable numeric id for each client identity
#[table(name = player, public)]
#[derive(Clone)]
pub struct Player {
    #[primary_key]
    pub identity: Identity,
    #[unique]
    #[auto_inc]
    pub player_id: u64,
    pub online: bool,
    pub first_seen: Timestamp,
}

// ============================================================================
// DEMAND PRICING
// ============================================================================

#[table(name = demand_record, public)]
#[derive(Clone)]
pub struct DemandRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    /// `item_type/item_id`, one row per pair
    #[unique]
    pub item_key: String,
    pub item_id: String,
    pub item_type: String,
    pub base_price: u64,
    pub current_price: u64,
    pub total_purchases: u64,
    pub purchases_in_window: u32,
    pub demand_score: f64,
    pub trend: u8, // DemandTrend as u8
    pub last_update: i64,
}

// ============================================================================
// VOLATILITY
// ============================================================================

/// Volatility index singleton (id always 0)
#[table(name = volatility_state, public)]
#[derive(Clone)]
pub struct VolatilityRow {
    #[primary_key]
    pub id: u32,
    pub index: f64,
    pub trend: u8, // VolatilityTrend as u8
    pub difficulty_multiplier: f64,
    pub reward_multiplier: f64,
    pub last_update: i64,
}

// ============================================================================
// MARKET EVENTS & WAGERS
// ============================================================================

#[table(name = market_event, public)]
#[derive(Clone)]
pub struct MarketEventRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    /// Sector label or "Broad Market"
    pub sector: String,
    pub change_percent: f64,
    pub message: String,
    pub is_active: bool,
    pub created_at: i64,
    pub expires_at: i64,
}

#[table(name = wager, public)]
#[derive(Clone)]
pub struct WagerRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub challenger_id: u64,
    pub opponent_id: u64,
    pub stake: u64,
    pub status: u8, // WagerStatus as u8
    pub created_at: i64,
}

// ============================================================================
// SEASONS
// ============================================================================

#[table(name = season, public)]
#[derive(Clone)]
pub struct SeasonRow {
    #[primary_key]
    pub season_number: u32,
    pub status: u8, // SeasonStatus as u8
    pub start_date: i64,
    pub end_date: i64,
    pub total_players: u32,
    pub reward_coins: u64,
    pub reward_gems: u64,
    pub reward_cosmetic: String,
    pub top_player_id: Option<u64>,
    pub top_rating: Option<i32>,
}

#[table(name = season_participation, public)]
#[derive(Clone)]
pub struct ParticipationRow {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub season_number: u32,
    pub player_id: u64,
    pub current_rating: i32,
    pub current_rank: Option<u32>,
    pub reward_tier: Option<u8>, // RewardTier as u8
    pub joined_at: i64,
}
