//! Global volatility index and the multipliers derived from it.
//!
//! The index moves in small steps driven by recent activity: a busy wager
//! book pushes it up, a quiet one lets it sink toward a floor, and a crowd of
//! live market events gives it an extra kick. Difficulty and reward
//! multipliers are pure, clamped functions of the index and are rewritten
//! together with it on every tick.

use serde::{Deserialize, Serialize};

use crate::constants::{volatility, volatility_trends, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityTrend {
    Stable,
    Increasing,
    Decreasing,
}

impl VolatilityTrend {
    pub fn to_u8(self) -> u8 {
        match self {
            VolatilityTrend::Stable => volatility_trends::STABLE,
            VolatilityTrend::Increasing => volatility_trends::INCREASING,
            VolatilityTrend::Decreasing => volatility_trends::DECREASING,
        }
    }

    pub fn from_u8(val: u8) -> VolatilityTrend {
        match val {
            volatility_trends::INCREASING => VolatilityTrend::Increasing,
            volatility_trends::DECREASING => VolatilityTrend::Decreasing,
            _ => VolatilityTrend::Stable,
        }
    }
}

/// The singleton volatility row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityState {
    /// 0.0–100.0
    pub index: f64,
    pub trend: VolatilityTrend,
    /// 0.75–1.5
    pub difficulty_multiplier: f64,
    /// 0.5–2.0
    pub reward_multiplier: f64,
    pub last_update: Millis,
}

impl VolatilityState {
    /// Initial state: neutral index, neutral multipliers.
    pub fn initial(now: Millis) -> Self {
        Self {
            index: volatility::INITIAL_INDEX,
            trend: VolatilityTrend::Stable,
            difficulty_multiplier: 1.0,
            reward_multiplier: 1.0,
            last_update: now,
        }
    }
}

/// Activity counts sampled from the store for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivitySignals {
    /// Accepted wagers among the most recent 20.
    pub recent_accepted_wagers: usize,
    /// Active events among the most recent 10.
    pub recent_active_events: usize,
}

pub fn difficulty_multiplier(index: f64) -> f64 {
    (1.0 + (index - 50.0) / 100.0 * 0.5).clamp(0.75, 1.5)
}

pub fn reward_multiplier(index: f64) -> f64 {
    (1.0 + (index - 50.0) / 100.0).clamp(0.5, 2.0)
}

fn classify_trend(old_index: f64, new_index: f64) -> VolatilityTrend {
    if new_index > old_index + volatility::TREND_THRESHOLD {
        VolatilityTrend::Increasing
    } else if new_index < old_index - volatility::TREND_THRESHOLD {
        VolatilityTrend::Decreasing
    } else {
        VolatilityTrend::Stable
    }
}

/// Next index value for the given signals.
pub fn next_index(index: f64, signals: &ActivitySignals) -> f64 {
    let mut next = index;
    if signals.recent_accepted_wagers > volatility::BUSY_WAGERS {
        next = (next + volatility::BUSY_STEP).min(volatility::MAX_INDEX);
    } else if signals.recent_accepted_wagers < volatility::QUIET_WAGERS {
        next = (next - volatility::QUIET_STEP).max(volatility::QUIET_FLOOR);
    }
    if signals.recent_active_events > volatility::BUSY_EVENTS {
        next = (next + volatility::EVENT_STEP).min(volatility::MAX_INDEX);
    }
    // A stored index outside [0, 100] must never leak back out.
    next.clamp(0.0, volatility::MAX_INDEX)
}

/// Compute the full next state. All four fields come from the same tick.
pub fn tick(prev: &VolatilityState, signals: &ActivitySignals, now: Millis) -> VolatilityState {
    let index = next_index(prev.index, signals);
    VolatilityState {
        index,
        trend: classify_trend(prev.index, index),
        difficulty_multiplier: difficulty_multiplier(index),
        reward_multiplier: reward_multiplier(index),
        last_update: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(wagers: usize, events: usize) -> ActivitySignals {
        ActivitySignals {
            recent_accepted_wagers: wagers,
            recent_active_events: events,
        }
    }

    #[test]
    fn test_initial_state() {
        let s = VolatilityState::initial(5);
        assert_eq!(s.index, 50.0);
        assert_eq!(s.trend, VolatilityTrend::Stable);
        assert_eq!(s.difficulty_multiplier, 1.0);
        assert_eq!(s.reward_multiplier, 1.0);
    }

    #[test]
    fn test_busy_wagers_worked_example() {
        let s = tick(&VolatilityState::initial(0), &signals(12, 0), 10);
        assert_eq!(s.index, 52.0);
        assert_eq!(s.trend, VolatilityTrend::Stable);
        assert!((s.difficulty_multiplier - 1.01).abs() < 1e-12);
        assert!((s.reward_multiplier - 1.02).abs() < 1e-12);
        assert_eq!(s.last_update, 10);
    }

    #[test]
    fn test_quiet_wagers_lower_index() {
        let s = tick(&VolatilityState::initial(0), &signals(2, 0), 0);
        assert_eq!(s.index, 49.0);
    }

    #[test]
    fn test_moderate_activity_holds() {
        for w in 3..=10 {
            let s = tick(&VolatilityState::initial(0), &signals(w, 0), 0);
            assert_eq!(s.index, 50.0, "wagers={}", w);
        }
    }

    #[test]
    fn test_events_add_and_trend_increases() {
        let s = tick(&VolatilityState::initial(0), &signals(12, 6), 0);
        assert_eq!(s.index, 57.0);
        assert_eq!(s.trend, VolatilityTrend::Increasing);
        // Exactly 5 events is not enough
        let s = tick(&VolatilityState::initial(0), &signals(5, 5), 0);
        assert_eq!(s.index, 50.0);
    }

    #[test]
    fn test_quiet_floor() {
        let mut s = VolatilityState::initial(0);
        for _ in 0..100 {
            s = tick(&s, &signals(0, 0), 0);
        }
        assert_eq!(s.index, 10.0);
        assert_eq!(s.difficulty_multiplier, 0.8);
        assert!((s.reward_multiplier - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_cap_at_100() {
        let mut s = VolatilityState::initial(0);
        for _ in 0..50 {
            s = tick(&s, &signals(20, 10), 0);
        }
        assert_eq!(s.index, 100.0);
        assert_eq!(s.difficulty_multiplier, 1.25);
        assert_eq!(s.reward_multiplier, 1.5);
        assert_eq!(s.trend, VolatilityTrend::Stable);
    }

    #[test]
    fn test_multiplier_clamps() {
        for i in 0..=100 {
            let d = difficulty_multiplier(i as f64);
            let r = reward_multiplier(i as f64);
            assert!((0.75..=1.5).contains(&d));
            assert!((0.5..=2.0).contains(&r));
        }
        assert_eq!(difficulty_multiplier(-500.0), 0.75);
        assert_eq!(reward_multiplier(500.0), 2.0);
    }

    #[test]
    fn test_out_of_range_stored_index_is_clamped() {
        let mut prev = VolatilityState::initial(0);
        prev.index = 140.0;
        let s = tick(&prev, &signals(5, 0), 0);
        assert_eq!(s.index, 100.0);
        assert_eq!(s.trend, VolatilityTrend::Decreasing);
    }

    #[test]
    fn test_trend_roundtrip() {
        for t in [
            VolatilityTrend::Stable,
            VolatilityTrend::Increasing,
            VolatilityTrend::Decreasing,
        ] {
            assert_eq!(VolatilityTrend::from_u8(t.to_u8()), t);
        }
    }
}
