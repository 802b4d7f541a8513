use crate::market::Venue;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

/// A detected buy-low/sell-high spread between two venues for one pair.
#[derive(Debug, Clone, Serialize)]
pub struct RawOpportunity {
    pub pair: String,
    pub buy_venue: Venue,
    pub sell_venue: Venue,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Profit fraction net of both venues' spreads.
    pub net_profit_fraction: f64,
    /// Executable size, capped at 10% of the thinner side's liquidity.
    pub available_volume: f64,
    pub estimated_profit: f64,
    pub risk_score: f64,
    pub detected_at: DateTime<Utc>,
}

impl RawOpportunity {
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.detected_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn key(&self) -> OpportunityKey {
        OpportunityKey {
            pair: self.pair.clone(),
            buy_venue: self.buy_venue,
            sell_venue: self.sell_venue,
        }
    }

    pub fn log_summary(&self) {
        info!(
            "Opportunity {}: buy {} @ {:.6}, sell {} @ {:.6}, net {:.4}%, volume {:.0}, est. profit {:.2}, risk {:.3}",
            self.pair,
            self.buy_venue,
            self.buy_price,
            self.sell_venue,
            self.sell_price,
            self.net_profit_fraction * 100.0,
            self.available_volume,
            self.estimated_profit,
            self.risk_score,
        );
    }
}

/// Identity of a logical opportunity. The active set is keyed by this so the
/// same spread observed across cycles replaces its previous entry instead of
/// piling up duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OpportunityKey {
    pub pair: String,
    pub buy_venue: Venue,
    pub sell_venue: Venue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpportunityKind {
    Arbitrage,
    SelfLiquidate,
}

impl std::fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpportunityKind::Arbitrage => write!(f, "arbitrage"),
            OpportunityKind::SelfLiquidate => write!(f, "self_liquidate"),
        }
    }
}

/// An opportunity enriched with oracle signals and admitted to the active set.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredOpportunity {
    pub kind: OpportunityKind,
    pub pair: String,
    pub amount: u64,
    pub expected_profit: f64,
    pub risk_score: f64,
    pub ml_confidence: f64,
    pub ml_profit_probability: f64,
    pub anomaly_score: f64,
    pub combined_score: f64,
    pub promoted_at: DateTime<Utc>,
    /// Present for arbitrage opportunities; liquidation candidates carry none.
    pub arbitrage: Option<RawOpportunity>,
}

impl ScoredOpportunity {
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.promoted_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn key(&self) -> OpportunityKey {
        match &self.arbitrage {
            Some(raw) => raw.key(),
            None => OpportunityKey {
                pair: self.pair.clone(),
                buy_venue: Venue::Unknown(0),
                sell_venue: Venue::Unknown(0),
            },
        }
    }
}

/// Executed-opportunity record kept by the orchestrator for operators.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedOpportunity {
    pub signature: String,
    pub kind: OpportunityKind,
    pub pair: String,
    pub amount: u64,
    pub expected_profit: f64,
    pub executed_at: DateTime<Utc>,
}
