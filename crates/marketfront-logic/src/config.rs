//! Economy configuration.
//!
//! Every field has a default matching live tuning, and `#[serde(default)]`
//! lets a JSON file override only the values it names:
//!
//! ```
//! use marketfront_logic::config::EconomyConfig;
//!
//! let cfg = EconomyConfig::from_json(r#"{ "seasons": { "max_seasons": 3 } }"#).unwrap();
//! assert_eq!(cfg.seasons.max_seasons, 3);
//! assert_eq!(cfg.seasons.length_days, 30);
//! ```
//!
//! Parsed values are checked by [`EconomyConfig::validate`]; a document that
//! parses but names a zero window or a probability above 1 is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{seasons, Millis, DAY_MS, HOUR_MS, MINUTE_MS};

/// Top-level economy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EconomyConfig {
    pub demand: DemandConfig,
    pub events: MarketEventConfig,
    pub seasons: SeasonConfig,
    pub cadence: CadenceConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn positive(field: &'static str, value: Millis) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive, got {}", value),
        })
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be within 0..=1, got {}", value),
        })
    }
}

fn max_change(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be a non-negative percent, got {}", value),
        })
    }
}

impl EconomyConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: EconomyConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the passes cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("demand.window_ms", self.demand.window_ms)?;

        probability("events.sector_probability", self.events.sector_probability)?;
        probability("events.broad_probability", self.events.broad_probability)?;
        max_change("events.sector_max_change", self.events.sector_max_change)?;
        max_change("events.broad_max_change", self.events.broad_max_change)?;
        positive("events.lifetime_ms", self.events.lifetime_ms)?;

        if self.seasons.max_seasons == 0 {
            return Err(ConfigError::Invalid {
                field: "seasons.max_seasons",
                reason: "at least one season is required".into(),
            });
        }
        positive("seasons.length_days", self.seasons.length_days)?;

        positive("cadence.worker_interval_ms", self.cadence.worker_interval_ms)?;
        positive("cadence.decay_interval_ms", self.cadence.decay_interval_ms)?;
        positive("cadence.volatility_interval_ms", self.cadence.volatility_interval_ms)?;
        positive("cadence.season_interval_ms", self.cadence.season_interval_ms)?;
        if let Some(spawn) = self.cadence.spawn_interval_ms {
            positive("cadence.spawn_interval_ms", spawn)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    /// Age a record must reach before the decay sweep touches it.
    pub window_ms: Millis,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self { window_ms: DAY_MS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketEventConfig {
    /// Chance each sector rolls an event in one spawn pass.
    pub sector_probability: f64,
    /// Sector events move prices uniformly within ±this percent.
    pub sector_max_change: f64,
    pub broad_probability: f64,
    pub broad_max_change: f64,
    pub lifetime_ms: Millis,
}

impl Default for MarketEventConfig {
    fn default() -> Self {
        Self {
            sector_probability: 0.3,
            sector_max_change: 5.0,
            broad_probability: 0.1,
            broad_max_change: 2.5,
            lifetime_ms: DAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    /// Highest season number that will ever be opened.
    pub max_seasons: u32,
    pub length_days: i64,
}

impl SeasonConfig {
    pub fn length_ms(&self) -> Millis {
        self.length_days * DAY_MS
    }
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            max_seasons: seasons::DEFAULT_MAX_SEASONS,
            length_days: seasons::DEFAULT_LENGTH_DAYS,
        }
    }
}

/// How often the worker runs each pass. Expiry runs on every worker tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub worker_interval_ms: Millis,
    pub decay_interval_ms: Millis,
    pub volatility_interval_ms: Millis,
    pub season_interval_ms: Millis,
    /// Automatic spawning; `None` leaves spawning to administrators.
    pub spawn_interval_ms: Option<Millis>,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            worker_interval_ms: MINUTE_MS,
            decay_interval_ms: HOUR_MS,
            volatility_interval_ms: 5 * MINUTE_MS,
            season_interval_ms: 5 * MINUTE_MS,
            spawn_interval_ms: None,
        }
    }
}
