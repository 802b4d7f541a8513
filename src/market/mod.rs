//! Venue quote model and the shared price cache fed by per-venue pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod feeds;

pub use cache::{MarketSummary, PriceCache};

/// A liquidity source quoting prices for token pairs. The discriminant is the
/// stable 1-byte venue id used in on-chain route encoding; it also defines the
/// deterministic tie-break order when two venues quote the same price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    Raydium,
    Orca,
    Jupiter,
    Saber,
    Unknown(u8),
}

impl Venue {
    pub fn id(&self) -> u8 {
        match self {
            Venue::Raydium => 1,
            Venue::Orca => 2,
            Venue::Jupiter => 3,
            Venue::Saber => 4,
            Venue::Unknown(id) => *id,
        }
    }

    pub fn from_id(id: u8) -> Self {
        match id {
            1 => Venue::Raydium,
            2 => Venue::Orca,
            3 => Venue::Jupiter,
            4 => Venue::Saber,
            other => Venue::Unknown(other),
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Raydium => write!(f, "raydium"),
            Venue::Orca => write!(f, "orca"),
            Venue::Jupiter => write!(f, "jupiter"),
            Venue::Saber => write!(f, "saber"),
            Venue::Unknown(id) => write!(f, "unknown({})", id),
        }
    }
}

/// A venue's latest observation for one token pair. Immutable once created;
/// the cache overwrites the previous quote per (venue, pair).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueQuote {
    pub venue: Venue,
    pub pair: String,
    pub price: f64,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub spread_fraction: f64,
    pub observed_at: DateTime<Utc>,
}

impl VenueQuote {
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.observed_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window_secs: u64) -> bool {
        self.age_secs(now) <= window_secs as f64
    }
}
