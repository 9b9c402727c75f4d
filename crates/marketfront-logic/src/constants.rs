//! Economy constants: time units, tuning values and `u8` storage IDs.
//!
//! These are plain constants with no database dependency.
//! Both the SpacetimeDB server and the native simtest use these.

/// Milliseconds since the Unix epoch. All timestamps in the economy use this.
pub type Millis = i64;

pub const MINUTE_MS: Millis = 60 * 1000;
pub const HOUR_MS: Millis = 60 * MINUTE_MS;
pub const DAY_MS: Millis = 24 * HOUR_MS;

pub mod demand {
    /// Score every new record starts at.
    pub const BASE_SCORE: f64 = 50.0;
    /// Score added per purchase inside the window.
    pub const SCORE_PER_PURCHASE: f64 = 5.0;
    pub const MAX_SCORE: f64 = 100.0;
    /// Decay never pushes the score below this floor.
    pub const DECAY_SCORE_FLOOR: f64 = 30.0;
    /// Fraction of the premium over base price kept on each decay step.
    pub const DECAY_RETAIN: f64 = 0.9;
    /// Relative move needed before a price change counts as a trend.
    pub const TREND_BAND: f64 = 0.05;
}

pub mod volatility {
    pub const INITIAL_INDEX: f64 = 50.0;
    pub const MAX_INDEX: f64 = 100.0;
    /// Quiet markets never drift below this.
    pub const QUIET_FLOOR: f64 = 10.0;
    pub const WAGER_SAMPLE: usize = 20;
    pub const EVENT_SAMPLE: usize = 10;
    pub const BUSY_WAGERS: usize = 10;
    pub const QUIET_WAGERS: usize = 3;
    pub const BUSY_EVENTS: usize = 5;
    pub const BUSY_STEP: f64 = 2.0;
    pub const QUIET_STEP: f64 = 1.0;
    pub const EVENT_STEP: f64 = 5.0;
    pub const TREND_THRESHOLD: f64 = 3.0;
}

pub mod seasons {
    pub const DEFAULT_MAX_SEASONS: u32 = 12;
    pub const DEFAULT_LENGTH_DAYS: i64 = 30;
    pub const BASE_COINS: u64 = 50_000;
    pub const COINS_PER_SEASON: u64 = 1_000;
    pub const BASE_GEMS: u64 = 500;
    pub const GEMS_PER_SEASON: u64 = 10;
    /// Rating every player starts a season with.
    pub const STARTING_RATING: i32 = 1000;
    /// Rating moved from loser to winner when a wager settles.
    pub const WAGER_RATING_STEP: i32 = 25;
}

pub mod demand_trends {
    pub const STABLE: u8 = 0;
    pub const RISING: u8 = 1;
    pub const FALLING: u8 = 2;
}

pub mod volatility_trends {
    pub const STABLE: u8 = 0;
    pub const INCREASING: u8 = 1;
    pub const DECREASING: u8 = 2;
}

pub mod season_statuses {
    pub const ACTIVE: u8 = 0;
    pub const COMPLETED: u8 = 1;
}

pub mod reward_tiers {
    pub const BRONZE: u8 = 0;
    pub const SILVER: u8 = 1;
    pub const GOLD: u8 = 2;
    pub const PLATINUM: u8 = 3;
    pub const DIAMOND: u8 = 4;
}

pub mod wager_statuses {
    pub const PENDING: u8 = 0;
    pub const ACCEPTED: u8 = 1;
    pub const DECLINED: u8 = 2;
    pub const SETTLED: u8 = 3;
}
