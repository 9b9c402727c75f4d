//! Competitive seasons and their reward tiers.
//!
//! Seasons run back to back for a fixed length. When one ends every
//! participant is ranked by rating and bucketed into a reward tier by
//! percentile, the season is frozen as completed, and the next number opens.
//! Numbering stops at a configured maximum; past it no season is ever opened
//! again.
//!
//! # Tiers
//!
//! | Percentile | Tier |
//! |------------|------|
//! | ≤ 1%  | Diamond |
//! | ≤ 5%  | Platinum |
//! | ≤ 15% | Gold |
//! | ≤ 35% | Silver |
//! | rest  | Bronze |

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::config::SeasonConfig;
use crate::constants::{reward_tiers, season_statuses, seasons, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeasonStatus {
    Active,
    Completed,
}

impl SeasonStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            SeasonStatus::Active => season_statuses::ACTIVE,
            SeasonStatus::Completed => season_statuses::COMPLETED,
        }
    }

    pub fn from_u8(val: u8) -> SeasonStatus {
        match val {
            season_statuses::ACTIVE => SeasonStatus::Active,
            _ => SeasonStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RewardTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl RewardTier {
    pub fn to_u8(self) -> u8 {
        match self {
            RewardTier::Bronze => reward_tiers::BRONZE,
            RewardTier::Silver => reward_tiers::SILVER,
            RewardTier::Gold => reward_tiers::GOLD,
            RewardTier::Platinum => reward_tiers::PLATINUM,
            RewardTier::Diamond => reward_tiers::DIAMOND,
        }
    }

    pub fn from_u8(val: u8) -> RewardTier {
        match val {
            reward_tiers::DIAMOND => RewardTier::Diamond,
            reward_tiers::PLATINUM => RewardTier::Platinum,
            reward_tiers::GOLD => RewardTier::Gold,
            reward_tiers::SILVER => RewardTier::Silver,
            _ => RewardTier::Bronze,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RewardTier::Bronze => "bronze",
            RewardTier::Silver => "silver",
            RewardTier::Gold => "gold",
            RewardTier::Platinum => "platinum",
            RewardTier::Diamond => "diamond",
        }
    }
}

/// Prizes on offer for a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    pub coins: u64,
    pub gems: u64,
    pub cosmetic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub season_number: u32,
    pub status: SeasonStatus,
    pub start_date: Millis,
    pub end_date: Millis,
    pub total_players: u32,
    pub reward_pool: RewardPool,
    pub top_player_id: Option<u64>,
    pub top_rating: Option<i32>,
}

impl Season {
    pub fn is_active(&self) -> bool {
        self.status == SeasonStatus::Active
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.end_date
    }
}

/// One player's entry in one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonParticipation {
    pub season_number: u32,
    pub player_id: u64,
    pub current_rating: i32,
    /// Set only when the season closes.
    pub current_rank: Option<u32>,
    /// Set only when the season closes.
    pub reward_tier: Option<RewardTier>,
    /// Join order; breaks rating ties.
    pub joined_at: Millis,
}

impl SeasonParticipation {
    pub fn new(season_number: u32, player_id: u64, now: Millis) -> Self {
        Self {
            season_number,
            player_id,
            current_rating: seasons::STARTING_RATING,
            current_rank: None,
            reward_tier: None,
            joined_at: now,
        }
    }
}

/// `current + delta`, floored at zero.
pub fn adjusted_rating(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).max(0)
}

/// Reward pool for season `n`: linear in the season number.
pub fn reward_pool(season_number: u32) -> RewardPool {
    let n = season_number as u64;
    RewardPool {
        coins: seasons::BASE_COINS + seasons::COINS_PER_SEASON * n,
        gems: seasons::BASE_GEMS + seasons::GEMS_PER_SEASON * n,
        cosmetic: format!("Season {} Champion Banner", season_number),
    }
}

/// Highest season number seen, or 0 when none exist.
pub fn last_season_number(seasons: &[Season]) -> u32 {
    seasons.iter().map(|s| s.season_number).max().unwrap_or(0)
}

/// The season that follows `last_number`, or `None` once the cap is reached.
pub fn plan_next_season(last_number: u32, now: Millis, cfg: &SeasonConfig) -> Option<Season> {
    let next = last_number.checked_add(1)?;
    if next > cfg.max_seasons {
        return None;
    }
    Some(Season {
        season_number: next,
        status: SeasonStatus::Active,
        start_date: now,
        end_date: now + cfg.length_ms(),
        total_players: 0,
        reward_pool: reward_pool(next),
        top_player_id: None,
        top_rating: None,
    })
}

/// Percentile of a 1-based rank, for display.
pub fn percentile(rank: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    rank as f64 / total as f64 * 100.0
}

/// Tier for a 1-based rank among `total` players.
///
/// Compares `rank / total * 100 <= threshold` in integers so the boundaries
/// are exact (3rd of 20 is exactly 15% and lands in gold).
pub fn tier_for_rank(rank: u32, total: u32) -> RewardTier {
    let scaled = rank as u64 * 100;
    let total = total.max(1) as u64;
    if scaled <= total {
        RewardTier::Diamond
    } else if scaled <= 5 * total {
        RewardTier::Platinum
    } else if scaled <= 15 * total {
        RewardTier::Gold
    } else if scaled <= 35 * total {
        RewardTier::Silver
    } else {
        RewardTier::Bronze
    }
}

/// Final placement of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub player_id: u64,
    pub rating: i32,
    pub rank: u32,
    pub tier: RewardTier,
}

/// Rank participants by rating, highest first.
///
/// The sort is stable on `(rating desc, joined_at asc)`, so equal ratings keep
/// join order and fully tied rows keep input order.
pub fn rank_participants(rows: &[SeasonParticipation]) -> Vec<Standing> {
    let mut ordered: Vec<&SeasonParticipation> = rows.iter().collect();
    ordered.sort_by_key(|p| (Reverse(p.current_rating), p.joined_at));
    let total = ordered.len() as u32;
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let rank = i as u32 + 1;
            Standing {
                player_id: p.player_id,
                rating: p.current_rating,
                rank,
                tier: tier_for_rank(rank, total),
            }
        })
        .collect()
}

/// Completed copy of `season` summarising `standings`.
pub fn completed_season(season: &Season, standings: &[Standing]) -> Season {
    let top = standings.first();
    Season {
        status: SeasonStatus::Completed,
        total_players: standings.len() as u32,
        top_player_id: top.map(|s| s.player_id),
        top_rating: top.map(|s| s.rating),
        ..season.clone()
    }
}
