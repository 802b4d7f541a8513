use crate::arbitrage::opportunity::{
    OpportunityKey, OpportunityKind, RawOpportunity, ScoredOpportunity,
};
use crate::error::{ArbError, Result};
use crate::market::PriceCache;
use crate::oracle::{AnomalyDetector, MarketSnapshot, ProfitPredictor};
use chrono::Utc;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Weighted blend of the detector's edge, the oracle signals, and the risk
/// factor. Always lands in [0, 1].
pub fn combined_score(
    net_profit_fraction: f64,
    profit_probability: f64,
    confidence: f64,
    anomaly: f64,
    risk_score: f64,
) -> f64 {
    let base = (net_profit_fraction * 100.0).clamp(0.0, 1.0);
    let ml = profit_probability * confidence;
    let calm = 1.0 - anomaly;
    let risk_adjustment = 1.0 - risk_score;
    (0.4 * base + 0.3 * ml + 0.2 * calm + 0.1 * risk_adjustment).clamp(0.0, 1.0)
}

/// Enriches detector output with oracle signals and promotes qualifying
/// candidates into the shared active set.
pub struct ScoringEngine {
    predictor: Arc<dyn ProfitPredictor>,
    anomaly_detector: Arc<dyn AnomalyDetector>,
    oracle_timeout: Duration,
    promotion_threshold: f64,
}

impl ScoringEngine {
    pub fn new(
        predictor: Arc<dyn ProfitPredictor>,
        anomaly_detector: Arc<dyn AnomalyDetector>,
        oracle_timeout: Duration,
        promotion_threshold: f64,
    ) -> Self {
        Self {
            predictor,
            anomaly_detector,
            oracle_timeout,
            promotion_threshold,
        }
    }

    /// Cross-venue context for one candidate, handed to the oracles.
    pub fn build_snapshot(&self, cache: &PriceCache, opportunity: &RawOpportunity) -> MarketSnapshot {
        let mut prices = Vec::new();
        let mut volumes = Vec::new();
        let mut venue_prices = HashMap::new();
        if let Some(quotes) = cache.snapshot().get(&opportunity.pair) {
            for quote in quotes {
                prices.push(quote.price);
                volumes.push(quote.volume_24h);
                venue_prices.insert(quote.venue, quote.price);
            }
        }
        MarketSnapshot {
            pair: opportunity.pair.clone(),
            prices,
            volumes,
            venue_prices,
            spread: opportunity.net_profit_fraction,
            liquidity: opportunity.available_volume,
            observed_at: opportunity.detected_at,
        }
    }

    /// Scores one opportunity. Oracle overruns and failures surface as
    /// `OracleError`: the caller skips the candidate for this cycle and does
    /// not retry within it.
    pub async fn score(
        &self,
        cache: &PriceCache,
        opportunity: &RawOpportunity,
    ) -> Result<ScoredOpportunity> {
        let snapshot = self.build_snapshot(cache, opportunity);

        let prediction = tokio::time::timeout(self.oracle_timeout, self.predictor.predict(&snapshot))
            .await
            .map_err(|_| {
                ArbError::OracleError(format!(
                    "Profit predictor exceeded {:?} for '{}'",
                    self.oracle_timeout, opportunity.pair
                ))
            })?;

        let signals = tokio::time::timeout(
            self.oracle_timeout,
            self.anomaly_detector.anomaly_signals(&snapshot),
        )
        .await
        .map_err(|_| {
            ArbError::OracleError(format!(
                "Anomaly detector exceeded {:?} for '{}'",
                self.oracle_timeout, opportunity.pair
            ))
        })?;

        let score = combined_score(
            opportunity.net_profit_fraction,
            prediction.profit_probability,
            prediction.confidence,
            signals.overall_anomaly,
            opportunity.risk_score,
        );

        Ok(ScoredOpportunity {
            kind: OpportunityKind::Arbitrage,
            pair: opportunity.pair.clone(),
            amount: opportunity.available_volume.max(0.0) as u64,
            expected_profit: opportunity.estimated_profit,
            risk_score: opportunity.risk_score,
            ml_confidence: prediction.confidence,
            ml_profit_probability: prediction.profit_probability,
            anomaly_score: signals.overall_anomaly,
            combined_score: score,
            promoted_at: Utc::now(),
            arbitrage: Some(opportunity.clone()),
        })
    }

    /// Scores every current detector opportunity and admits those above the
    /// promotion threshold. The active set is keyed by
    /// (pair, buy venue, sell venue): re-observing a live spread replaces its
    /// entry rather than appending a duplicate.
    pub async fn score_and_promote(
        &self,
        cache: &PriceCache,
        opportunities: &[RawOpportunity],
        active: &Mutex<HashMap<OpportunityKey, ScoredOpportunity>>,
    ) -> usize {
        let mut promoted = 0;
        for opportunity in opportunities {
            let scored = match self.score(cache, opportunity).await {
                Ok(scored) => scored,
                Err(e) => {
                    debug!(
                        "Skipping '{}' this cycle: {}",
                        opportunity.pair, e
                    );
                    continue;
                }
            };
            if scored.combined_score > self.promotion_threshold {
                info!(
                    "Promoting {} opportunity: buy {} sell {}, score {:.3}, est. profit {:.2}",
                    scored.pair,
                    opportunity.buy_venue,
                    opportunity.sell_venue,
                    scored.combined_score,
                    scored.expected_profit
                );
                active.lock().await.insert(opportunity.key(), scored);
                promoted += 1;
            } else {
                debug!(
                    "Opportunity '{}' scored {:.3}, below promotion threshold {:.2}",
                    scored.pair, scored.combined_score, self.promotion_threshold
                );
            }
        }
        promoted
    }
}
