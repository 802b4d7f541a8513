use crate::arbitrage::opportunity::RawOpportunity;
use crate::error::{ArbError, Result};
use crate::market::{PriceCache, VenueQuote};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Net profit fraction an opportunity must strictly exceed.
    pub min_profit_fraction: f64,
    /// Quotes older than this are ignored by a sweep.
    pub quote_freshness_secs: u64,
    /// Detected opportunities older than this are hidden from readers.
    pub exposure_window_secs: u64,
    /// Fraction of the thinner side's liquidity considered executable.
    pub liquidity_fraction: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_profit_fraction: 0.005,
            quote_freshness_secs: 30,
            exposure_window_secs: 10,
            liquidity_fraction: 0.1,
        }
    }
}

/// Sweeps price-cache snapshots for cross-venue spreads.
///
/// Each sweep replaces the published opportunity set atomically; there is no
/// incremental patching. Ties on price go to the lowest venue id (the
/// snapshot orders quotes that way), so repeated sweeps over identical data
/// select identical venues.
pub struct OpportunityDetector {
    config: DetectorConfig,
    latest: RwLock<Vec<RawOpportunity>>,
}

impl OpportunityDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            latest: RwLock::new(Vec::new()),
        }
    }

    /// One detection pass over the cache. A pair that fails to process is
    /// logged and skipped; the rest of the sweep continues.
    pub fn run_sweep(&self, cache: &PriceCache) {
        let snapshot = cache.snapshot();
        let opportunities = self.sweep(&snapshot);
        debug!(
            "Detector sweep over {} pairs produced {} opportunities",
            snapshot.len(),
            opportunities.len()
        );
        *self.latest.write().expect("detector set lock poisoned") = opportunities;
    }

    pub fn sweep(&self, snapshot: &HashMap<String, Vec<VenueQuote>>) -> Vec<RawOpportunity> {
        let now = Utc::now();
        let mut opportunities = Vec::new();
        for (pair, quotes) in snapshot {
            match self.find_for_pair(pair, quotes, now) {
                Ok(Some(opportunity)) => {
                    opportunity.log_summary();
                    opportunities.push(opportunity);
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping pair '{}' in sweep: {}", pair, e),
            }
        }
        opportunities.sort_by(|a, b| {
            b.estimated_profit
                .partial_cmp(&a.estimated_profit)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        opportunities
    }

    /// Only opportunities detected within the exposure window. This staleness
    /// filter is separate from (and tighter than) quote freshness.
    pub fn current_opportunities(&self) -> Vec<RawOpportunity> {
        let now = Utc::now();
        self.latest
            .read()
            .expect("detector set lock poisoned")
            .iter()
            .filter(|opp| opp.age_secs(now) <= self.config.exposure_window_secs as f64)
            .cloned()
            .collect()
    }

    fn find_for_pair(
        &self,
        pair: &str,
        quotes: &[VenueQuote],
        now: DateTime<Utc>,
    ) -> Result<Option<RawOpportunity>> {
        let fresh: Vec<&VenueQuote> = quotes
            .iter()
            .filter(|q| q.is_fresh(now, self.config.quote_freshness_secs))
            .collect();
        if fresh.len() < 2 {
            return Ok(None);
        }

        for quote in &fresh {
            if !quote.price.is_finite() || quote.price <= 0.0 {
                return Err(ArbError::ParseError(format!(
                    "Venue '{}' published a degenerate price {} for '{}'",
                    quote.venue, quote.price, pair
                )));
            }
        }

        // Strict comparisons keep the first-seen (lowest venue id) quote on
        // equal prices.
        let buy = fresh
            .iter()
            .copied()
            .fold(fresh[0], |best, q| if q.price < best.price { q } else { best });
        let sell = fresh
            .iter()
            .copied()
            .fold(fresh[0], |best, q| if q.price > best.price { q } else { best });

        if buy.price >= sell.price {
            return Ok(None);
        }

        let raw_profit_fraction = (sell.price - buy.price) / buy.price;
        let total_spread = buy.spread_fraction + sell.spread_fraction;
        let net_profit_fraction = raw_profit_fraction - total_spread;
        if net_profit_fraction <= self.config.min_profit_fraction {
            return Ok(None);
        }

        let available_volume =
            self.config.liquidity_fraction * buy.liquidity.min(sell.liquidity);
        let estimated_profit = available_volume * net_profit_fraction;
        let risk_score = self.risk_score(buy, sell, raw_profit_fraction, now);

        Ok(Some(RawOpportunity {
            pair: pair.to_string(),
            buy_venue: buy.venue,
            sell_venue: sell.venue,
            buy_price: buy.price,
            sell_price: sell.price,
            net_profit_fraction,
            available_volume,
            estimated_profit,
            risk_score,
            detected_at: now,
        }))
    }

    /// Mean of four normalized risk factors: thin liquidity, spread eating
    /// the edge, stale quotes, and low 24h volume.
    fn risk_score(
        &self,
        buy: &VenueQuote,
        sell: &VenueQuote,
        raw_profit_fraction: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        let min_liquidity = buy.liquidity.min(sell.liquidity);
        let liquidity_risk = 1.0 / (1.0 + min_liquidity / 1_000_000.0);

        let total_spread = buy.spread_fraction + sell.spread_fraction;
        let spread_risk = if raw_profit_fraction > 0.0 {
            (total_spread / raw_profit_fraction).min(1.0)
        } else {
            1.0
        };

        let max_age = buy.age_secs(now).max(sell.age_secs(now));
        let freshness_risk = (max_age / self.config.quote_freshness_secs as f64).min(1.0);

        let volume_risk =
            (1.0 - buy.volume_24h.min(sell.volume_24h) / 10_000_000.0).max(0.0);

        (liquidity_risk + spread_risk + freshness_risk + volume_risk) / 4.0
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Default for OpportunityDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
