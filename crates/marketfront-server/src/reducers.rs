//! Client-facing reducers: pricing, wagers, seasons and administration.
//!
//! Periodic work is not exposed here; see [`crate::simulation`].
//! Administrative reducers, including direct rating changes, accept only the
//! module's own identity. Players move ratings through `settle_wager`.

use marketfront_logic::config::EconomyConfig;
use marketfront_logic::engine;
use marketfront_logic::store::StoreError;
use spacetimedb::{reducer, Identity, ReducerContext, Table};

use crate::simulation::{economy_config, now_ms, reschedule, tick_rng};
use crate::store::ModuleStore;
use crate::tables::*;

// ============================================================================
// LIFECYCLE
// ============================================================================

#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    let cfg = EconomyConfig::default();
    ctx.db.economy_config().insert(EconomyConfigRow {
        id: 0,
        json: cfg.to_json(),
        paused: false,
    });
    reschedule(ctx, cfg.cadence.worker_interval_ms);
    log::info!("Economy module initialized");
}

/// Called when a client connects
#[reducer(client_connected)]
pub fn client_connected(ctx: &ReducerContext) {
    log::info!("Client connected: {:?}", ctx.sender);
    match ctx.db.player().identity().find(ctx.sender) {
        Some(mut player) => {
            player.online = true;
            ctx.db.player().identity().update(player);
        }
        None => {
            ctx.db.player().insert(Player {
                identity: ctx.sender,
                player_id: 0,
                online: true,
                first_seen: ctx.timestamp,
            });
        }
    }
}

/// Called when a client disconnects
#[reducer(client_disconnected)]
pub fn client_disconnected(ctx: &ReducerContext) {
    log::info!("Client disconnected: {:?}", ctx.sender);
    if let Some(mut player) = ctx.db.player().identity().find(ctx.sender) {
        player.online = false;
        ctx.db.player().identity().update(player);
    }
}

fn owner_only(sender: Identity, module: Identity) -> Result<(), String> {
    if sender == module {
        Ok(())
    } else {
        Err("Only the module owner may do this".into())
    }
}

fn require_owner(ctx: &ReducerContext) -> Result<(), String> {
    let result = owner_only(ctx.sender, ctx.identity());
    if result.is_err() {
        log::warn!("Rejected administrative call from {:?}", ctx.sender);
    }
    result
}

fn caller_id(ctx: &ReducerContext) -> Result<u64, String> {
    ctx.db
        .player()
        .identity()
        .find(ctx.sender)
        .map(|p| p.player_id)
        .ok_or_else(|| "Unknown player; connect first".to_string())
}

// ============================================================================
// PRICING
// ============================================================================

/// Quote an item, creating its demand record at `base_price` on first use.
/// The price is published through the `demand_record` table.
#[reducer]
pub fn get_price(
    ctx: &ReducerContext,
    item_id: String,
    item_type: String,
    base_price: u64,
) -> Result<(), String> {
    if item_id.is_empty() || item_type.is_empty() {
        return Err("Item id and type are required".into());
    }
    let store = ModuleStore::new(ctx);
    engine::get_price(&store, &item_id, &item_type, base_price, now_ms(ctx))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[reducer]
pub fn record_purchase(ctx: &ReducerContext, item_id: String, item_type: String) -> Result<(), String> {
    let store = ModuleStore::new(ctx);
    match engine::record_purchase(&store, &item_id, &item_type, now_ms(ctx)) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::warn!("Purchase of {}/{} failed: {}", item_id, item_type, e);
            Err(e.to_string())
        }
    }
}

// ============================================================================
// WAGERS
// ============================================================================

#[reducer]
pub fn place_wager(ctx: &ReducerContext, opponent_id: u64, stake: u64) -> Result<(), String> {
    let challenger = caller_id(ctx)?;
    if ctx.db.player().player_id().find(opponent_id).is_none() {
        return Err(format!("Unknown opponent {}", opponent_id));
    }
    let store = ModuleStore::new(ctx);
    engine::place_wager(&store, challenger, opponent_id, stake, now_ms(ctx))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[reducer]
pub fn respond_to_wager(ctx: &ReducerContext, wager_id: u64, accept: bool) -> Result<(), String> {
    let responder = caller_id(ctx)?;
    let store = ModuleStore::new(ctx);
    engine::respond_to_wager(&store, wager_id, responder, accept)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[reducer]
pub fn settle_wager(ctx: &ReducerContext, wager_id: u64, winner_id: u64) -> Result<(), String> {
    let caller = caller_id(ctx)?;
    let store = ModuleStore::new(ctx);
    engine::settle_wager(&store, wager_id, caller, winner_id)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

// ============================================================================
// SEASONS
// ============================================================================

#[reducer]
pub fn join_season(ctx: &ReducerContext) -> Result<(), String> {
    let player = caller_id(ctx)?;
    let store = ModuleStore::new(ctx);
    match engine::join_season(&store, player, now_ms(ctx)) {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => Err("No active season".into()),
        Err(StoreError::Conflict(_)) => Err("Already joined this season".into()),
        Err(e) => Err(e.to_string()),
    }
}

/// Apply a rating correction. Matches between players settle through wagers.
#[reducer]
pub fn adjust_rating(ctx: &ReducerContext, player_id: u64, delta: i32) -> Result<(), String> {
    require_owner(ctx)?;
    let store = ModuleStore::new(ctx);
    engine::adjust_rating(&store, player_id, delta)
        .map(|row| log::debug!("Player {} rating now {}", player_id, row.current_rating))
        .map_err(|e| e.to_string())
}

// ============================================================================
// ADMINISTRATION
// ============================================================================

/// Roll a batch of market events now, outside the worker cadence.
#[reducer]
pub fn spawn_market_events(ctx: &ReducerContext) -> Result<(), String> {
    require_owner(ctx)?;
    let cfg = economy_config(ctx);
    let store = ModuleStore::new(ctx);
    let mut rng = tick_rng(ctx);
    let spawned = engine::spawn_pass(&store, &mut rng, now_ms(ctx), &cfg.events)
        .map_err(|e| e.to_string())?;
    log::info!("Spawned {} market events on request", spawned.len());
    Ok(())
}

#[reducer]
pub fn expire_market_events(ctx: &ReducerContext) -> Result<(), String> {
    require_owner(ctx)?;
    let store = ModuleStore::new(ctx);
    engine::expire_pass(&store, now_ms(ctx))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Pause/unpause the economy worker
#[reducer]
pub fn set_economy_paused(ctx: &ReducerContext, paused: bool) -> Result<(), String> {
    require_owner(ctx)?;
    if let Some(mut config) = ctx.db.economy_config().id().find(0) {
        config.paused = paused;
        ctx.db.economy_config().id().update(config);
        log::info!("Economy {}", if paused { "paused" } else { "resumed" });
    }
    Ok(())
}

/// Replace the tuning with `json`; fields left out keep their defaults.
#[reducer]
pub fn update_economy_config(ctx: &ReducerContext, json: String) -> Result<(), String> {
    require_owner(ctx)?;
    let cfg = EconomyConfig::from_json(&json).map_err(|e| format!("Invalid config: {}", e))?;
    let previous = economy_config(ctx);
    let paused = ctx
        .db
        .economy_config()
        .id()
        .find(0)
        .is_some_and(|row| row.paused);
    let row = EconomyConfigRow {
        id: 0,
        json: cfg.to_json(),
        paused,
    };
    if ctx.db.economy_config().id().find(0).is_some() {
        ctx.db.economy_config().id().update(row);
    } else {
        ctx.db.economy_config().insert(row);
    }
    if previous.cadence.worker_interval_ms != cfg.cadence.worker_interval_ms {
        reschedule(ctx, cfg.cadence.worker_interval_ms);
    }
    log::info!("Economy config updated");
    Ok(())
}
