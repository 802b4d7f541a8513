use crate::error::Result;
use crate::solana::ChainClient;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Default Solana signature fee, lamports.
pub const BASE_FEE_LAMPORTS: u64 = 5_000;
/// Base fee observations are reused for this long.
const BASE_FEE_CACHE_TTL: Duration = Duration::from_secs(30);
/// Congestion never scales the base fee beyond this factor.
const MAX_CONGESTION_MULTIPLIER: f64 = 2.0;

pub const MIN_PRIORITY_MULTIPLIER: f64 = 1.0;
pub const MAX_PRIORITY_MULTIPLIER: f64 = 3.0;

/// Instruction kinds the on-chain program accepts, with their compute budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InstructionKind {
    FlashArbitrage,
    FlashSelfLiquidate,
    RepayFlashLoan,
    Other,
}

impl InstructionKind {
    pub fn compute_units(&self) -> u32 {
        match self {
            InstructionKind::FlashArbitrage => 400_000,
            InstructionKind::FlashSelfLiquidate => 300_000,
            InstructionKind::RepayFlashLoan => 100_000,
            InstructionKind::Other => 200_000,
        }
    }
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstructionKind::FlashArbitrage => write!(f, "flash_arbitrage"),
            InstructionKind::FlashSelfLiquidate => write!(f, "flash_self_liquidate"),
            InstructionKind::RepayFlashLoan => write!(f, "repay_flash_loan"),
            InstructionKind::Other => write!(f, "other"),
        }
    }
}

/// Process-wide fee posture. Mutated only by the maintenance optimizer; every
/// cost estimate reads it.
#[derive(Debug, Clone, Serialize)]
pub struct FeePolicy {
    pub max_user_fee: u64,
    pub priority_multiplier: f64,
    pub covers_overage_from_loan: bool,
}

impl FeePolicy {
    pub fn new(max_user_fee: u64, priority_multiplier: f64, covers_overage_from_loan: bool) -> Self {
        Self {
            max_user_fee,
            priority_multiplier: priority_multiplier
                .clamp(MIN_PRIORITY_MULTIPLIER, MAX_PRIORITY_MULTIPLIER),
            covers_overage_from_loan,
        }
    }

    /// Nudges the multiplier from the observed 24h success rate: raise 10%
    /// when deliveries drop below 90%, relax 5% when above 95%, always
    /// clamped to [1.0, 3.0].
    pub fn adjust_for_success_rate(&mut self, success_rate: f64) {
        if success_rate < 0.90 {
            self.priority_multiplier *= 1.1;
        } else if success_rate > 0.95 {
            self.priority_multiplier *= 0.95;
        }
        self.priority_multiplier = self
            .priority_multiplier
            .clamp(MIN_PRIORITY_MULTIPLIER, MAX_PRIORITY_MULTIPLIER);
    }
}

/// Full cost breakdown for one execution attempt. Recomputed per attempt,
/// never cached.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionCostEstimate {
    pub base_fee: u64,
    pub compute_units: u32,
    pub priority_fee: u64,
    pub protocol_fee: u64,
    pub total_cost: u64,
}

/// Estimates attempt costs against the live fee policy, with a short-lived
/// congestion-adjusted base fee cache.
pub struct FeeEstimator {
    policy: Arc<RwLock<FeePolicy>>,
    fee_rate_bps: u64,
    base_fee_cache: Mutex<Option<(u64, Instant)>>,
}

impl FeeEstimator {
    pub fn new(policy: Arc<RwLock<FeePolicy>>, fee_rate_bps: u64) -> Self {
        Self {
            policy,
            fee_rate_bps,
            base_fee_cache: Mutex::new(None),
        }
    }

    pub fn congestion_multiplier(slot: u64) -> f64 {
        (1.0 + (slot % 100) as f64 / 1000.0).min(MAX_CONGESTION_MULTIPLIER)
    }

    pub fn protocol_fee(&self, amount: u64) -> u64 {
        amount.saturating_mul(self.fee_rate_bps) / 10_000
    }

    /// Base fee adjusted for congestion, cached for 30 seconds. Slot fetch
    /// failures fall back to the unadjusted default rather than blocking an
    /// attempt.
    pub async fn current_base_fee(&self, client: &dyn ChainClient) -> u64 {
        let mut cache = self.base_fee_cache.lock().await;
        if let Some((fee, fetched_at)) = *cache {
            if fetched_at.elapsed() < BASE_FEE_CACHE_TTL {
                return fee;
            }
        }
        let fee = match client.slot().await {
            Ok(slot) => {
                let adjusted =
                    (BASE_FEE_LAMPORTS as f64 * Self::congestion_multiplier(slot)) as u64;
                debug!(
                    "Base fee refreshed: {} lamports (slot {}, congestion {:.3})",
                    adjusted,
                    slot,
                    Self::congestion_multiplier(slot)
                );
                adjusted
            }
            Err(e) => {
                warn!("Slot fetch failed during fee estimation: {}", e);
                BASE_FEE_LAMPORTS
            }
        };
        *cache = Some((fee, Instant::now()));
        fee
    }

    pub async fn estimate(
        &self,
        client: &dyn ChainClient,
        kind: InstructionKind,
        amount: u64,
    ) -> Result<TransactionCostEstimate> {
        let base_fee = self.current_base_fee(client).await;
        let priority_multiplier = self.policy.read().await.priority_multiplier;
        let priority_fee = (base_fee as f64 * priority_multiplier) as u64;
        let protocol_fee = self.protocol_fee(amount);
        Ok(TransactionCostEstimate {
            base_fee,
            compute_units: kind.compute_units(),
            priority_fee,
            protocol_fee,
            total_cost: base_fee + priority_fee + protocol_fee,
        })
    }
}
