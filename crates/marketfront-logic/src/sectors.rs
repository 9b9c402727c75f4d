//! Market sectors and the fixed ticker-to-sector lookup table.
//!
//! Market events are scoped either to one [`Sector`] or to the whole market
//! ([`EventScope::BroadMarket`]). A ticker feels an event when the event's
//! scope covers the ticker's sector.

use serde::{Deserialize, Serialize};

/// Industry sector a ticker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Technology,
    Finance,
    Energy,
    Healthcare,
    Consumer,
    Industrials,
}

impl Sector {
    /// All sectors in spawn order.
    pub const ALL: [Sector; 6] = [
        Sector::Technology,
        Sector::Finance,
        Sector::Energy,
        Sector::Healthcare,
        Sector::Consumer,
        Sector::Industrials,
    ];

    /// Sector assigned to tickers missing from the table.
    pub const DEFAULT: Sector = Sector::Technology;

    pub fn label(self) -> &'static str {
        match self {
            Sector::Technology => "Technology",
            Sector::Finance => "Finance",
            Sector::Energy => "Energy",
            Sector::Healthcare => "Healthcare",
            Sector::Consumer => "Consumer",
            Sector::Industrials => "Industrials",
        }
    }

    pub fn from_label(label: &str) -> Option<Sector> {
        Sector::ALL.into_iter().find(|s| s.label() == label)
    }
}

/// Label stored for events that hit every sector.
pub const BROAD_MARKET: &str = "Broad Market";

/// What part of the market an event applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventScope {
    Sector(Sector),
    BroadMarket,
}

impl EventScope {
    pub fn label(self) -> &'static str {
        match self {
            EventScope::Sector(s) => s.label(),
            EventScope::BroadMarket => BROAD_MARKET,
        }
    }

    /// Parse a stored label. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<EventScope> {
        if label == BROAD_MARKET {
            Some(EventScope::BroadMarket)
        } else {
            Sector::from_label(label).map(EventScope::Sector)
        }
    }

    /// Whether an event with this scope moves tickers in `sector`.
    pub fn covers(self, sector: Sector) -> bool {
        match self {
            EventScope::Sector(s) => s == sector,
            EventScope::BroadMarket => true,
        }
    }
}

/// Fixed ticker table. Tickers are matched case-sensitively.
pub const TICKER_SECTORS: &[(&str, Sector)] = &[
    ("NOVA", Sector::Technology),
    ("QBIT", Sector::Technology),
    ("CHIP", Sector::Technology),
    ("VLTB", Sector::Finance),
    ("CRDT", Sector::Finance),
    ("LEDG", Sector::Finance),
    ("FUSN", Sector::Energy),
    ("SOLR", Sector::Energy),
    ("PTRO", Sector::Energy),
    ("GENE", Sector::Healthcare),
    ("MEDX", Sector::Healthcare),
    ("CART", Sector::Consumer),
    ("SNAK", Sector::Consumer),
    ("LUXE", Sector::Consumer),
    ("FORG", Sector::Industrials),
    ("RAIL", Sector::Industrials),
];

/// Sector for `ticker`, falling back to [`Sector::DEFAULT`].
pub fn sector_for_ticker(ticker: &str) -> Sector {
    TICKER_SECTORS
        .iter()
        .find(|(t, _)| *t == ticker)
        .map(|(_, s)| *s)
        .unwrap_or(Sector::DEFAULT)
}

/// All tickers listed in `sector`.
pub fn tickers_in_sector(sector: Sector) -> impl Iterator<Item = &'static str> {
    TICKER_SECTORS
        .iter()
        .filter(move |(_, s)| *s == sector)
        .map(|(t, _)| *t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ticker_lookup() {
        assert_eq!(sector_for_ticker("FUSN"), Sector::Energy);
        assert_eq!(sector_for_ticker("GENE"), Sector::Healthcare);
    }

    #[test]
    fn test_unknown_ticker_uses_default() {
        assert_eq!(sector_for_ticker("ZZZZ"), Sector::DEFAULT);
        assert_eq!(sector_for_ticker("nova"), Sector::DEFAULT);
    }

    #[test]
    fn test_every_sector_has_tickers() {
        for sector in Sector::ALL {
            assert!(tickers_in_sector(sector).count() > 0, "{:?}", sector);
        }
    }

    #[test]
    fn test_scope_labels_parse_back() {
        assert_eq!(
            EventScope::from_label("Broad Market"),
            Some(EventScope::BroadMarket)
        );
        assert_eq!(
            EventScope::from_label("Finance"),
            Some(EventScope::Sector(Sector::Finance))
        );
        assert_eq!(EventScope::from_label("Crypto"), None);
    }

    #[test]
    fn test_scope_coverage() {
        assert!(EventScope::BroadMarket.covers(Sector::Energy));
        assert!(EventScope::Sector(Sector::Energy).covers(Sector::Energy));
        assert!(!EventScope::Sector(Sector::Finance).covers(Sector::Energy));
    }
}
