//! MarketFront Server - SpacetimeDB Module
//!
//! Hosts the game economy: demand pricing, the volatility index, market
//! events and competitive seasons. The formulas and passes live in
//! `marketfront-logic`; this module stores their state in tables and runs
//! the periodic passes from one scheduled reducer.

mod reducers;
mod simulation;
mod store;
mod tables;

pub use reducers::*;
pub use simulation::economy_tick;
pub use tables::*;
