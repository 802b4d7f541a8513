//! End-to-end detection → scoring → promotion over an in-memory market.

use async_trait::async_trait;
use chrono::Utc;
use flash_arb_bot::arbitrage::{DetectorConfig, OpportunityDetector, ScoringEngine};
use flash_arb_bot::market::{PriceCache, Venue, VenueQuote};
use flash_arb_bot::oracle::{
    AnomalyDetector, AnomalySignals, MarketSnapshot, Prediction, ProfitPredictor,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

struct ConfidentPredictor;

#[async_trait]
impl ProfitPredictor for ConfidentPredictor {
    async fn predict(&self, _snapshot: &MarketSnapshot) -> Prediction {
        Prediction {
            profit_probability: 0.9,
            confidence: 0.9,
        }
    }
}

struct QuietAnomaly;

#[async_trait]
impl AnomalyDetector for QuietAnomaly {
    async fn anomaly_signals(&self, _snapshot: &MarketSnapshot) -> AnomalySignals {
        AnomalySignals {
            overall_anomaly: 0.1,
            price_dispersion: 0.0,
            volume_skew: 0.0,
        }
    }
}

fn quote(venue: Venue, pair: &str, price: f64, spread: f64, liquidity: f64) -> VenueQuote {
    VenueQuote {
        venue,
        pair: pair.to_string(),
        price,
        volume_24h: 8_000_000.0,
        liquidity,
        spread_fraction: spread,
        observed_at: Utc::now(),
    }
}

#[tokio::test]
async fn detected_spread_flows_into_the_active_set() {
    let cache = PriceCache::new();
    cache.upsert(quote(Venue::Raydium, "SOL/USDC", 100.0, 0.003, 5_000_000.0));
    cache.upsert(quote(Venue::Orca, "SOL/USDC", 102.0, 0.002, 4_000_000.0));
    // A pair with only one venue must never produce an opportunity.
    cache.upsert(quote(Venue::Saber, "RAY/USDC", 2.4, 0.0025, 1_000_000.0));

    let detector = OpportunityDetector::new(DetectorConfig::default());
    detector.run_sweep(&cache);
    let detected = detector.current_opportunities();
    assert_eq!(detected.len(), 1);

    let opportunity = &detected[0];
    assert_eq!(opportunity.pair, "SOL/USDC");
    assert_eq!(opportunity.buy_venue, Venue::Raydium);
    assert_eq!(opportunity.sell_venue, Venue::Orca);
    assert!((opportunity.net_profit_fraction - 0.015).abs() < 1e-12);
    assert!((opportunity.available_volume - 400_000.0).abs() < 1e-9);
    assert!((opportunity.estimated_profit - 6_000.0).abs() < 1e-9);

    let engine = ScoringEngine::new(
        Arc::new(ConfidentPredictor),
        Arc::new(QuietAnomaly),
        Duration::from_secs(10),
        0.7,
    );
    let active = Mutex::new(HashMap::new());
    let promoted = engine.score_and_promote(&cache, &detected, &active).await;
    assert_eq!(promoted, 1);

    let guard = active.lock().await;
    let scored = guard.values().next().unwrap();
    assert!(scored.combined_score > 0.7);
    assert!((0.0..=1.0).contains(&scored.combined_score));
    assert_eq!(scored.amount, 400_000);
}

#[tokio::test]
async fn marginal_markets_promote_nothing() {
    let cache = PriceCache::new();
    // Raw edge exactly equal to the combined venue spread: net profit zero.
    cache.upsert(quote(Venue::Raydium, "SOL/USDC", 100.0, 0.003, 5_000_000.0));
    cache.upsert(quote(Venue::Orca, "SOL/USDC", 100.5, 0.002, 4_000_000.0));

    let detector = OpportunityDetector::new(DetectorConfig::default());
    detector.run_sweep(&cache);
    assert!(detector.current_opportunities().is_empty());

    let engine = ScoringEngine::new(
        Arc::new(ConfidentPredictor),
        Arc::new(QuietAnomaly),
        Duration::from_secs(10),
        0.7,
    );
    let active = Mutex::new(HashMap::new());
    let promoted = engine
        .score_and_promote(&cache, &detector.current_opportunities(), &active)
        .await;
    assert_eq!(promoted, 0);
    assert!(active.lock().await.is_empty());
}

#[tokio::test]
async fn repeated_cycles_keep_one_entry_per_venue_pair() {
    let cache = PriceCache::new();
    cache.upsert(quote(Venue::Raydium, "SOL/USDC", 100.0, 0.003, 5_000_000.0));
    cache.upsert(quote(Venue::Orca, "SOL/USDC", 102.0, 0.002, 4_000_000.0));

    let detector = OpportunityDetector::new(DetectorConfig::default());
    let engine = ScoringEngine::new(
        Arc::new(ConfidentPredictor),
        Arc::new(QuietAnomaly),
        Duration::from_secs(10),
        0.7,
    );
    let active = Mutex::new(HashMap::new());

    for _ in 0..5 {
        detector.run_sweep(&cache);
        engine
            .score_and_promote(&cache, &detector.current_opportunities(), &active)
            .await;
    }
    assert_eq!(active.lock().await.len(), 1);
}
