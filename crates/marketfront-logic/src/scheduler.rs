//! Single authoritative worker that owns every periodic economy pass.
//!
//! The worker is driven by one timer (the server's scheduled reducer, or the
//! harness loop). On each wake-up [`run_due`] runs whichever passes are due
//! according to [`CadenceConfig`] and the last-run marks kept in the store.
//! Marks are saved after each pass, so a tick cut short only repeats the
//! passes that had not committed yet.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{CadenceConfig, EconomyConfig};
use crate::constants::Millis;
use crate::engine::{self, SeasonClose};
use crate::store::{EconomyStore, StoreResult};
use crate::volatility::VolatilityState;

/// When each pass last ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleMarks {
    pub last_decay: Option<Millis>,
    pub last_volatility: Option<Millis>,
    pub last_season: Option<Millis>,
    pub last_spawn: Option<Millis>,
}

fn due(last: Option<Millis>, interval: Millis, now: Millis) -> bool {
    match last {
        None => true,
        Some(t) => now - t >= interval,
    }
}

/// Passes due at `now`, in run order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuePasses {
    pub spawn: bool,
    pub decay: bool,
    pub volatility: bool,
    pub season: bool,
}

pub fn due_passes(marks: &ScheduleMarks, cadence: &CadenceConfig, now: Millis) -> DuePasses {
    DuePasses {
        spawn: cadence
            .spawn_interval_ms
            .is_some_and(|interval| due(marks.last_spawn, interval, now)),
        decay: due(marks.last_decay, cadence.decay_interval_ms, now),
        volatility: due(marks.last_volatility, cadence.volatility_interval_ms, now),
        season: due(marks.last_season, cadence.season_interval_ms, now),
    }
}

/// What one worker tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub expired_events: usize,
    pub spawned_events: usize,
    pub decayed_records: Option<usize>,
    pub volatility: Option<VolatilityState>,
    pub season_ran: bool,
    pub season_close: Option<SeasonClose>,
}

/// Run every pass that is due. Expiry runs on every tick.
pub fn run_due<S: EconomyStore + ?Sized, R: Rng + ?Sized>(
    store: &S,
    rng: &mut R,
    now: Millis,
    cfg: &EconomyConfig,
) -> StoreResult<TickReport> {
    let mut marks = store.schedule_marks()?;
    let plan = due_passes(&marks, &cfg.cadence, now);
    let mut report = TickReport {
        expired_events: engine::expire_pass(store, now)?,
        ..TickReport::default()
    };

    if plan.spawn {
        report.spawned_events = engine::spawn_pass(store, rng, now, &cfg.events)?.len();
        marks.last_spawn = Some(now);
        store.put_schedule_marks(&marks)?;
    }
    if plan.decay {
        report.decayed_records = Some(engine::decay_pass(store, now, &cfg.demand)?);
        marks.last_decay = Some(now);
        store.put_schedule_marks(&marks)?;
    }
    if plan.volatility {
        report.volatility = Some(engine::volatility_tick(store, now)?);
        marks.last_volatility = Some(now);
        store.put_schedule_marks(&marks)?;
    }
    if plan.season {
        report.season_close = engine::season_tick(store, now, &cfg.seasons)?;
        report.season_ran = true;
        marks.last_season = Some(now);
        store.put_schedule_marks(&marks)?;
    }

    log::debug!("Economy tick at {}: {:?}", now, plan);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HOUR_MS, MINUTE_MS};
    use crate::store::{MemoryStore, StoreError};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_everything_due_initially_except_spawn() {
        let plan = due_passes(&ScheduleMarks::default(), &CadenceConfig::default(), 0);
        assert!(plan.decay && plan.volatility && plan.season);
        assert!(!plan.spawn);
    }

    #[test]
    fn test_cadence_respected() {
        let marks = ScheduleMarks {
            last_decay: Some(0),
            last_volatility: Some(0),
            last_season: Some(0),
            last_spawn: Some(0),
        };
        let cadence = CadenceConfig {
            spawn_interval_ms: Some(2 * HOUR_MS),
            ..CadenceConfig::default()
        };
        let plan = due_passes(&marks, &cadence, 4 * MINUTE_MS);
        assert_eq!(plan, DuePasses::default());
        let plan = due_passes(&marks, &cadence, 5 * MINUTE_MS);
        assert!(plan.volatility && plan.season && !plan.decay && !plan.spawn);
        let plan = due_passes(&marks, &cadence, 2 * HOUR_MS);
        assert!(plan.decay && plan.spawn);
    }

    #[test]
    fn test_run_due_opens_season_and_volatility() {
        let store = MemoryStore::new();
        let cfg = EconomyConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let report = run_due(&store, &mut rng, 0, &cfg).unwrap();
        assert!(report.season_ran);
        assert_eq!(report.volatility.as_ref().unwrap().index, 49.0);
        assert_eq!(report.decayed_records, Some(0));
        assert!(store.active_season().unwrap().is_some());

        // One minute later nothing periodic is due
        let report = run_due(&store, &mut rng, MINUTE_MS, &cfg).unwrap();
        assert!(!report.season_ran);
        assert!(report.volatility.is_none());
        assert!(report.decayed_records.is_none());
    }

    #[test]
    fn test_failed_tick_leaves_marks_for_retry() {
        let store = MemoryStore::new();
        let cfg = EconomyConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        store.set_offline(true);
        assert!(matches!(
            run_due(&store, &mut rng, 0, &cfg),
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        assert_eq!(store.schedule_marks().unwrap(), ScheduleMarks::default());
        assert!(run_due(&store, &mut rng, 0, &cfg).unwrap().season_ran);
    }
}
