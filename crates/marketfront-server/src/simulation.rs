//! The scheduled economy worker.
//!
//! `economy_tick` is the only place periodic passes run. It wakes on the
//! `economy_schedule` timer and hands the module store to
//! `marketfront_logic::scheduler::run_due`, which decides from the stored
//! marks whether decay, volatility, spawning or the season check are due.

use marketfront_logic::config::EconomyConfig;
use marketfront_logic::constants::Millis;
use marketfront_logic::scheduler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spacetimedb::{reducer, ReducerContext, ScheduleAt, Table, TimeDuration};

use crate::store::ModuleStore;
use crate::tables::*;

pub fn now_ms(ctx: &ReducerContext) -> Millis {
    ctx.timestamp.to_micros_since_unix_epoch() / 1000
}

/// Deterministic per-transaction RNG, seeded from the reducer timestamp.
pub fn tick_rng(ctx: &ReducerContext) -> StdRng {
    StdRng::seed_from_u64(ctx.timestamp.to_micros_since_unix_epoch() as u64)
}

/// Stored configuration, or defaults if the row is missing or unreadable.
pub fn economy_config(ctx: &ReducerContext) -> EconomyConfig {
    let Some(row) = ctx.db.economy_config().id().find(0) else {
        return EconomyConfig::default();
    };
    match EconomyConfig::from_json(&row.json) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("Stored economy config unreadable ({}), using defaults", e);
            EconomyConfig::default()
        }
    }
}

/// Replace the worker timer with one firing every `interval_ms`.
pub fn reschedule(ctx: &ReducerContext, interval_ms: Millis) {
    let existing: Vec<u64> = ctx
        .db
        .economy_schedule()
        .iter()
        .map(|s| s.scheduled_id)
        .collect();
    for id in existing {
        ctx.db.economy_schedule().scheduled_id().delete(id);
    }
    ctx.db.economy_schedule().insert(EconomySchedule {
        scheduled_id: 0,
        scheduled_at: ScheduleAt::Interval(TimeDuration::from_micros(interval_ms.max(1) * 1000)),
    });
    log::info!("Economy worker runs every {} ms", interval_ms);
}

// ============================================================================
// ECONOMY TICK
// ============================================================================

#[reducer]
pub fn economy_tick(ctx: &ReducerContext, _timer: EconomySchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("economy_tick is driven by the scheduler only".into());
    }
    if ctx
        .db
        .economy_config()
        .id()
        .find(0)
        .is_some_and(|row| row.paused)
    {
        return Ok(());
    }

    let cfg = economy_config(ctx);
    let store = ModuleStore::new(ctx);
    let now = now_ms(ctx);
    let mut rng = tick_rng(ctx);

    match scheduler::run_due(&store, &mut rng, now, &cfg) {
        Ok(report) => {
            if let Some(close) = &report.season_close {
                log::info!(
                    "Season {} completed with {} ranked players",
                    close.completed.season_number,
                    close.standings.len()
                );
            }
            if report.spawned_events > 0 || report.expired_events > 0 {
                log::debug!(
                    "Market events: {} spawned, {} expired",
                    report.spawned_events,
                    report.expired_events
                );
            }
            Ok(())
        }
        Err(e) => {
            // Rolled back; the next timer firing retries every pass still due.
            log::warn!("Economy tick failed: {}", e);
            Err(e.to_string())
        }
    }
}
