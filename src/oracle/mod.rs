//! Scoring oracle seam.
//!
//! The ML profitability predictor and the quantum-inspired anomaly scorer are
//! external collaborators: the bot only depends on these two traits and
//! enforces a deadline around every call. The heuristic implementations below
//! stand in when no trained model is wired up, mirroring the conservative
//! fallback predictions the modeling side ships.

use crate::market::Venue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Structured market context assembled for one candidate opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub pair: String,
    pub prices: Vec<f64>,
    pub volumes: Vec<f64>,
    pub venue_prices: HashMap<Venue, f64>,
    pub spread: f64,
    pub liquidity: f64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub profit_probability: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct AnomalySignals {
    pub overall_anomaly: f64,
    pub price_dispersion: f64,
    pub volume_skew: f64,
}

#[async_trait]
pub trait ProfitPredictor: Send + Sync {
    async fn predict(&self, snapshot: &MarketSnapshot) -> Prediction;
}

#[async_trait]
pub trait AnomalyDetector: Send + Sync {
    async fn anomaly_signals(&self, snapshot: &MarketSnapshot) -> AnomalySignals;
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Feature-completeness heuristic: confidence grows with how much of the
/// snapshot is actually populated, floored at the fallback confidence the
/// untrained model would report.
pub struct HeuristicPredictor;

#[async_trait]
impl ProfitPredictor for HeuristicPredictor {
    async fn predict(&self, snapshot: &MarketSnapshot) -> Prediction {
        let features = [
            !snapshot.prices.is_empty(),
            !snapshot.volumes.is_empty(),
            snapshot.venue_prices.len() >= 2,
            snapshot.spread > 0.0,
            snapshot.liquidity > 0.0,
        ];
        let filled = features.iter().filter(|f| **f).count() as f64;
        let confidence = clamp_unit(filled / features.len() as f64).max(0.1);

        // Wider spreads relative to typical venue fees read as more likely to
        // survive execution costs.
        let profit_probability = clamp_unit(snapshot.spread / 0.02).max(0.1);

        Prediction {
            profit_probability,
            confidence,
        }
    }
}

/// Flags markets whose venue prices disagree far more than the claimed edge,
/// or whose volumes are wildly lopsided.
pub struct DispersionAnomalyDetector;

impl DispersionAnomalyDetector {
    fn price_dispersion(prices: &[f64]) -> f64 {
        if prices.len() < 2 {
            return 0.0;
        }
        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        if mean == 0.0 {
            return 0.0;
        }
        let variance =
            prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;
        variance.sqrt() / mean
    }

    fn volume_skew(volumes: &[f64]) -> f64 {
        let max = volumes.iter().cloned().fold(0.0_f64, f64::max);
        let min = volumes.iter().cloned().fold(f64::INFINITY, f64::min);
        if !min.is_finite() || max == 0.0 {
            return 0.0;
        }
        1.0 - min / max
    }
}

#[async_trait]
impl AnomalyDetector for DispersionAnomalyDetector {
    async fn anomaly_signals(&self, snapshot: &MarketSnapshot) -> AnomalySignals {
        let price_dispersion = Self::price_dispersion(&snapshot.prices);
        let volume_skew = Self::volume_skew(&snapshot.volumes);
        // A 5% cross-venue dispersion is treated as fully anomalous.
        let dispersion_component = clamp_unit(price_dispersion / 0.05);
        let overall_anomaly = clamp_unit(0.7 * dispersion_component + 0.3 * volume_skew);
        AnomalySignals {
            overall_anomaly,
            price_dispersion,
            volume_skew,
        }
    }
}
