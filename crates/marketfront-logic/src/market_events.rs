//! Market events: random sector and broad-market price shocks.
//!
//! A spawn pass rolls each sector independently, then rolls once more for a
//! broad-market event, so a single pass can produce anywhere from zero events
//! to one per sector plus a broad one. Events live for a fixed lifetime and
//! are switched off by the expiry sweep. While active they scale the
//! effective price of every ticker they cover.
//!
//! The random source is passed in, so a seeded `StdRng` makes spawning
//! reproducible in tests and in the headless harness.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MarketEventConfig;
use crate::constants::Millis;
use crate::sectors::{sector_for_ticker, EventScope, Sector};

/// A stored market event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: u64,
    pub scope: EventScope,
    /// Signed percent move, two decimals.
    pub change_percent: f64,
    pub message: String,
    pub is_active: bool,
    pub created_at: Millis,
    pub expires_at: Millis,
}

/// An event that has been rolled but not stored yet (no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub scope: EventScope,
    pub change_percent: f64,
    pub message: String,
    pub created_at: Millis,
    pub expires_at: Millis,
}

impl EventDraft {
    pub fn into_event(self, id: u64) -> MarketEvent {
        MarketEvent {
            id,
            scope: self.scope,
            change_percent: self.change_percent,
            message: self.message,
            is_active: true,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Round to two decimal places.
pub fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Headline for an event, chosen by the sign of the move.
pub fn event_message(scope: EventScope, change_percent: f64) -> String {
    let label = scope.label();
    if change_percent > 0.0 {
        format!("{} rallies {:.2}% on strong demand", label, change_percent)
    } else if change_percent < 0.0 {
        format!("{} slides {:.2}% as sellers step in", label, change_percent.abs())
    } else {
        format!("{} trades flat", label)
    }
}

fn draft<R: Rng + ?Sized>(
    rng: &mut R,
    scope: EventScope,
    max_change: f64,
    now: Millis,
    cfg: &MarketEventConfig,
) -> EventDraft {
    let change_percent = if max_change > 0.0 {
        round_percent(rng.gen_range(-max_change..=max_change))
    } else {
        0.0
    };
    EventDraft {
        scope,
        change_percent,
        message: event_message(scope, change_percent),
        created_at: now,
        expires_at: now + cfg.lifetime_ms,
    }
}

/// Roll one spawn pass. Each sector and the broad market roll independently.
pub fn roll_events<R: Rng + ?Sized>(
    rng: &mut R,
    now: Millis,
    cfg: &MarketEventConfig,
) -> Vec<EventDraft> {
    let mut drafts = Vec::new();
    let sector_p = cfg.sector_probability.clamp(0.0, 1.0);
    let broad_p = cfg.broad_probability.clamp(0.0, 1.0);

    for sector in Sector::ALL {
        if rng.gen_bool(sector_p) {
            drafts.push(draft(
                rng,
                EventScope::Sector(sector),
                cfg.sector_max_change,
                now,
                cfg,
            ));
        }
    }
    if rng.gen_bool(broad_p) {
        drafts.push(draft(
            rng,
            EventScope::BroadMarket,
            cfg.broad_max_change,
            now,
            cfg,
        ));
    }
    drafts
}

/// Deactivate the event if it has expired. Returns whether anything changed.
pub fn expire(event: &mut MarketEvent, now: Millis) -> bool {
    if event.is_active && event.expires_at < now {
        event.is_active = false;
        true
    } else {
        false
    }
}

/// Product of `1 + change/100` over active events covering the ticker.
pub fn price_modifier(ticker: &str, events: &[MarketEvent]) -> f64 {
    let sector = sector_for_ticker(ticker);
    events
        .iter()
        .filter(|e| e.is_active && e.scope.covers(sector))
        .map(|e| 1.0 + e.change_percent / 100.0)
        .product()
}
