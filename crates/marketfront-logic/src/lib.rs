//! Pure economy logic for MarketFront.
//!
//! This crate contains the economic simulation that sits behind the game:
//! demand-driven item pricing, the global volatility index, random market
//! events, and the competitive season lifecycle. Formulas take plain data and
//! return results; the [`engine`] passes run them against any
//! [`store::EconomyStore`], which keeps everything unit-testable here and
//! lets the SpacetimeDB module and the native harness share one code path.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Serde-loadable tuning: windows, probabilities, cadences, season cap |
//! | [`constants`] | Time units, tuning constants, `u8` storage IDs |
//! | [`engine`] | Store-backed operations: pricing, volatility, events, seasons, wagers |
//! | [`market_events`] | Sector / broad-market event rolls, expiry, price modifier |
//! | [`pricing`] | Demand records, purchase and decay formulas, effective price |
//! | [`scheduler`] | Single worker deciding which passes are due |
//! | [`seasons`] | Season numbering, reward pools, ranking, reward tiers |
//! | [`sectors`] | Sector enum and fixed ticker table |
//! | [`store`] | Entity store trait, errors, in-memory implementation |
//! | [`volatility`] | Volatility index step and clamped multipliers |
//! | [`wagers`] | Wager states sampled by the volatility index |

pub mod config;
pub mod constants;
pub mod engine;
pub mod market_events;
pub mod pricing;
pub mod scheduler;
pub mod seasons;
pub mod sectors;
pub mod store;
pub mod volatility;
pub mod wagers;
