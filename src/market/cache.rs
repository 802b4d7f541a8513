use super::{Venue, VenueQuote};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;

/// Concurrent cache of the latest quote per (venue, pair).
///
/// Writers are the independent venue ingestion tasks; readers take a
/// copy-on-read snapshot, so neither side blocks the other. Last write wins
/// unconditionally, with no ordering guarantee across venues.
pub struct PriceCache {
    quotes: DashMap<(Venue, String), VenueQuote>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    pub fn upsert(&self, quote: VenueQuote) {
        self.quotes
            .insert((quote.venue, quote.pair.clone()), quote);
    }

    pub fn get(&self, venue: Venue, pair: &str) -> Option<VenueQuote> {
        self.quotes
            .get(&(venue, pair.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Point-in-time copy grouped by pair. Each pair's quotes are ordered by
    /// venue id so downstream iteration (and price tie-breaking) is
    /// deterministic.
    pub fn snapshot(&self) -> HashMap<String, Vec<VenueQuote>> {
        let mut by_pair: HashMap<String, Vec<VenueQuote>> = HashMap::new();
        for entry in self.quotes.iter() {
            by_pair
                .entry(entry.value().pair.clone())
                .or_default()
                .push(entry.value().clone());
        }
        for quotes in by_pair.values_mut() {
            quotes.sort_by_key(|q| q.venue.id());
        }
        by_pair
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn market_summary(&self) -> MarketSummary {
        let snapshot = self.snapshot();
        let mut venues: Vec<Venue> = Vec::new();
        let mut spreads: Vec<f64> = Vec::new();
        for quotes in snapshot.values() {
            for quote in quotes {
                if !venues.contains(&quote.venue) {
                    venues.push(quote.venue);
                }
                spreads.push(quote.spread_fraction);
            }
        }
        let average_spread = if spreads.is_empty() {
            0.0
        } else {
            spreads.iter().sum::<f64>() / spreads.len() as f64
        };
        MarketSummary {
            pairs_monitored: snapshot.len(),
            quotes_cached: self.quotes.len(),
            venues_seen: venues.len(),
            average_spread,
        }
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub pairs_monitored: usize,
    pub quotes_cached: usize,
    pub venues_seen: usize,
    pub average_spread: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn quote(venue: Venue, pair: &str, price: f64) -> VenueQuote {
        VenueQuote {
            venue,
            pair: pair.to_string(),
            price,
            volume_24h: 1_000_000.0,
            liquidity: 5_000_000.0,
            spread_fraction: 0.003,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_is_last_write_wins() {
        let cache = PriceCache::new();
        cache.upsert(quote(Venue::Raydium, "SOL/USDC", 100.0));
        cache.upsert(quote(Venue::Raydium, "SOL/USDC", 101.5));
        assert_eq!(cache.len(), 1);
        let latest = cache.get(Venue::Raydium, "SOL/USDC").unwrap();
        assert_eq!(latest.price, 101.5);
    }

    #[test]
    fn snapshot_groups_by_pair_in_venue_id_order() {
        let cache = PriceCache::new();
        cache.upsert(quote(Venue::Saber, "SOL/USDC", 102.0));
        cache.upsert(quote(Venue::Raydium, "SOL/USDC", 100.0));
        cache.upsert(quote(Venue::Orca, "RAY/USDC", 2.5));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        let venues: Vec<Venue> = snapshot["SOL/USDC"].iter().map(|q| q.venue).collect();
        assert_eq!(venues, vec![Venue::Raydium, Venue::Saber]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let cache = PriceCache::new();
        cache.upsert(quote(Venue::Orca, "SOL/USDC", 100.0));
        let snapshot = cache.snapshot();
        cache.upsert(quote(Venue::Orca, "SOL/USDC", 200.0));
        assert_eq!(snapshot["SOL/USDC"][0].price, 100.0);
    }

    #[test]
    fn market_summary_counts_pairs_and_venues() {
        let cache = PriceCache::new();
        cache.upsert(quote(Venue::Raydium, "SOL/USDC", 100.0));
        cache.upsert(quote(Venue::Orca, "SOL/USDC", 101.0));
        let summary = cache.market_summary();
        assert_eq!(summary.pairs_monitored, 1);
        assert_eq!(summary.venues_seen, 2);
        assert!((summary.average_spread - 0.003).abs() < 1e-12);
    }
}
