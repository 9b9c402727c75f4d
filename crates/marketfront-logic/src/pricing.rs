//! Demand pricing: per-item price driven by purchases inside a rolling window.
//!
//! A [`DemandRecord`] exists for each `(item_id, item_type)` pair. Its price is
//! never set directly: a purchase re-derives the demand score from the window
//! purchase count and the price from the score, and the decay sweep pulls the
//! price back toward the immutable base price once the window has lapsed.
//!
//! ```
//! use marketfront_logic::pricing::{DemandRecord, apply_purchase};
//!
//! let mut rec = DemandRecord::new("sword", "weapon", 100, 0);
//! apply_purchase(&mut rec, 1_000);
//! apply_purchase(&mut rec, 2_000);
//! assert_eq!(rec.demand_score, 60.0);
//! assert_eq!(rec.current_price, 130); // round(100 * 1.3)
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{demand, demand_trends, Millis};
use crate::market_events::{price_modifier, MarketEvent};

/// Direction of the last price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandTrend {
    Stable,
    Rising,
    Falling,
}

impl DemandTrend {
    pub fn to_u8(self) -> u8 {
        match self {
            DemandTrend::Stable => demand_trends::STABLE,
            DemandTrend::Rising => demand_trends::RISING,
            DemandTrend::Falling => demand_trends::FALLING,
        }
    }

    pub fn from_u8(val: u8) -> DemandTrend {
        match val {
            demand_trends::RISING => DemandTrend::Rising,
            demand_trends::FALLING => DemandTrend::Falling,
            _ => DemandTrend::Stable,
        }
    }
}

/// Demand and price state for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub item_id: String,
    pub item_type: String,
    /// Fixed by the first price query for this key.
    pub base_price: u64,
    pub current_price: u64,
    pub total_purchases: u64,
    pub purchases_in_window: u32,
    /// 0.0–100.0
    pub demand_score: f64,
    pub trend: DemandTrend,
    pub last_update: Millis,
}

impl DemandRecord {
    /// Fresh record at base price and neutral demand.
    pub fn new(
        item_id: impl Into<String>,
        item_type: impl Into<String>,
        base_price: u64,
        now: Millis,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            item_type: item_type.into(),
            base_price,
            current_price: base_price,
            total_purchases: 0,
            purchases_in_window: 0,
            demand_score: demand::BASE_SCORE,
            trend: DemandTrend::Stable,
            last_update: now,
        }
    }
}

/// Single-string key for an `(item_id, item_type)` pair.
///
/// The type is length-prefixed, so no choice of separator characters in
/// either part can make two different pairs share a key.
pub fn demand_key(item_id: &str, item_type: &str) -> String {
    format!("{}:{}/{}", item_type.len(), item_type, item_id)
}

/// Demand score for a window purchase count: `min(100, 50 + 5p)`.
pub fn demand_score_for(purchases_in_window: u32) -> f64 {
    (demand::BASE_SCORE + demand::SCORE_PER_PURCHASE * purchases_in_window as f64)
        .min(demand::MAX_SCORE)
}

/// Price multiplier for a score, always within [1.0, 1.5].
pub fn price_multiplier(demand_score: f64) -> f64 {
    1.0 + demand_score.clamp(0.0, demand::MAX_SCORE) / 200.0
}

/// Price the record would have at `demand_score`.
pub fn price_for_score(base_price: u64, demand_score: f64) -> u64 {
    (base_price as f64 * price_multiplier(demand_score)).round() as u64
}

/// Classify a price move against the ±5% band.
pub fn classify_trend(old_price: u64, new_price: u64) -> DemandTrend {
    let old = old_price as f64;
    let new = new_price as f64;
    if new > old * (1.0 + demand::TREND_BAND) {
        DemandTrend::Rising
    } else if new < old * (1.0 - demand::TREND_BAND) {
        DemandTrend::Falling
    } else {
        DemandTrend::Stable
    }
}

/// Register one purchase and re-derive score, price, and trend.
pub fn apply_purchase(rec: &mut DemandRecord, now: Millis) {
    rec.purchases_in_window = rec.purchases_in_window.saturating_add(1);
    rec.total_purchases = rec.total_purchases.saturating_add(1);
    rec.demand_score = demand_score_for(rec.purchases_in_window);

    let new_price = price_for_score(rec.base_price, rec.demand_score);
    rec.trend = classify_trend(rec.current_price, new_price);
    rec.current_price = new_price;
    rec.last_update = now;
}

/// True once the record has gone a full window without an update.
pub fn decay_due(rec: &DemandRecord, now: Millis, window_ms: Millis) -> bool {
    now - rec.last_update >= window_ms
}

/// Pull the price 10% back toward base and relax demand.
///
/// Returns `false` (and leaves the record untouched) if the window has not
/// elapsed, so repeated sweeps inside one window are no-ops.
pub fn apply_decay(rec: &mut DemandRecord, now: Millis, window_ms: Millis) -> bool {
    if !decay_due(rec, now, window_ms) {
        return false;
    }
    let base = rec.base_price as f64;
    let target = base + (rec.current_price as f64 - base) * demand::DECAY_RETAIN;
    rec.current_price = target.round().max(0.0) as u64;
    rec.purchases_in_window = 0;
    rec.demand_score = (rec.demand_score * demand::DECAY_RETAIN)
        .max(demand::DECAY_SCORE_FLOOR)
        .min(demand::MAX_SCORE);
    rec.last_update = now;
    true
}

/// Base price scaled by every active event that covers the ticker's sector.
pub fn effective_price(ticker: &str, base_price: f64, events: &[MarketEvent]) -> f64 {
    base_price * price_modifier(ticker, events)
}
