use crate::arbitrage::detector::{DetectorConfig, OpportunityDetector};
use crate::arbitrage::opportunity::{
    ExecutedOpportunity, OpportunityKey, OpportunityKind, RawOpportunity, ScoredOpportunity,
};
use crate::arbitrage::scoring::ScoringEngine;
use crate::config::Config;
use crate::error::{ArbError, Result};
use crate::market::{feeds, MarketSummary, PriceCache};
use crate::oracle::{AnomalyDetector, DispersionAnomalyDetector, HeuristicPredictor, ProfitPredictor};
use crate::solana::{ChainClient, RpcChainClient};
use crate::tx::fees::FeePolicy;
use crate::tx::instructions::{
    flash_arbitrage_instruction, flash_self_liquidate_instruction, RouteHop,
};
use crate::tx::manager::{FeeStatistics, TransactionManager, TransactionRecord, TxManagerSettings};
use crate::tx::InstructionKind;
use crate::utils::{load_keypair, mint_for_symbol, split_pair};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, sleep};

/// Pause between execution-loop passes when the active set is empty.
const EXECUTION_IDLE_PAUSE: Duration = Duration::from_millis(100);
/// A valid arbitrage must still be detectable at 80% of its promoted edge.
const REVALIDATION_PROFIT_FACTOR: f64 = 0.8;
/// Fraction of the expected profit demanded on-chain as `min_profit`.
const MIN_PROFIT_FACTOR: f64 = 0.8;
/// Fraction of the expected value demanded as `min_out` for liquidations.
const MIN_OUT_FACTOR: f64 = 0.9;
/// Executed-opportunity log keeps this many entries.
const EXECUTED_HISTORY_CAP: usize = 100;

#[derive(Debug, Default)]
struct ExecutionStats {
    opportunities_processed: u64,
    successful_trades: u64,
    total_profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub opportunities_processed: u64,
    pub successful_trades: u64,
    pub total_profit: f64,
    pub active_opportunities: usize,
    pub detected_opportunities: usize,
    pub wallet: String,
    pub program_id: String,
    pub market: MarketSummary,
    pub fees: FeeStatistics,
}

/// Wires the price cache, detector, scoring stage, and transaction manager
/// together, and owns the cooperatively cancelled task loops.
pub struct Orchestrator {
    config: Arc<Config>,
    program_id: Pubkey,
    cache: Arc<PriceCache>,
    detector: Arc<OpportunityDetector>,
    scoring: Arc<ScoringEngine>,
    tx_manager: Arc<TransactionManager>,
    chain: Arc<dyn ChainClient>,
    active: Arc<Mutex<HashMap<OpportunityKey, ScoredOpportunity>>>,
    running: Arc<AtomicBool>,
    stats: Mutex<ExecutionStats>,
    executed: Mutex<Vec<ExecutedOpportunity>>,
}

impl Orchestrator {
    /// Production wiring: validates configuration, loads the wallet, binds
    /// the program, and connects the RPC client. Configuration problems are
    /// fatal here — the orchestrator refuses to start half-wired.
    pub fn initialize(config: Arc<Config>) -> Result<Arc<Self>> {
        info!("Initializing flash loan orchestrator...");
        config.validate()?;
        let wallet = load_keypair(&config.trader_wallet_keypair_path)?;
        let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(
            &config.rpc_url,
            config.rpc_url_backup.clone().unwrap_or_default(),
            config.rpc_max_retries,
            Duration::from_millis(config.rpc_retry_delay_ms),
        ));
        let orchestrator = Self::new(
            config,
            chain,
            Arc::new(wallet),
            Arc::new(HeuristicPredictor),
            Arc::new(DispersionAnomalyDetector),
        )?;
        info!("Flash loan orchestrator initialized successfully");
        Ok(orchestrator)
    }

    /// Component wiring with injectable chain client and oracles.
    pub fn new(
        config: Arc<Config>,
        chain: Arc<dyn ChainClient>,
        wallet: Arc<Keypair>,
        predictor: Arc<dyn ProfitPredictor>,
        anomaly_detector: Arc<dyn AnomalyDetector>,
    ) -> Result<Arc<Self>> {
        let program_id = config.program_pubkey()?;
        let policy = Arc::new(RwLock::new(FeePolicy::new(
            config.max_user_fee_lamports,
            config.initial_priority_multiplier,
            config.loan_covers_fee_overage,
        )));
        let tx_manager = Arc::new(TransactionManager::new(
            chain.clone(),
            wallet,
            policy,
            config.flash_loan_fee_rate_bps,
            TxManagerSettings::default(),
        ));
        let detector = Arc::new(OpportunityDetector::new(DetectorConfig {
            min_profit_fraction: config.min_profit_fraction,
            quote_freshness_secs: config.quote_freshness_secs,
            exposure_window_secs: config.opportunity_ttl_secs,
            ..DetectorConfig::default()
        }));
        let scoring = Arc::new(ScoringEngine::new(
            predictor,
            anomaly_detector,
            Duration::from_secs(config.oracle_timeout_secs),
            config.promotion_threshold,
        ));

        Ok(Arc::new(Self {
            config,
            program_id,
            cache: Arc::new(PriceCache::new()),
            detector,
            scoring,
            tx_manager,
            chain,
            active: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(AtomicBool::new(false)),
            stats: Mutex::new(ExecutionStats::default()),
            executed: Mutex::new(Vec::new()),
        }))
    }

    /// Spawns the venue ingestion, detection, scoring, execution, and
    /// maintenance loops. All of them check the shared running flag at their
    /// iteration boundaries; in-flight network calls finish naturally.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator start requested but it is already running");
            return;
        }
        info!("🚀 Starting flash loan orchestrator...");

        for source in feeds::default_sources() {
            tokio::spawn(feeds::run_ingestion_loop(
                source,
                self.cache.clone(),
                self.running.clone(),
                Duration::from_secs(self.config.venue_poll_interval_secs),
            ));
        }

        let detection = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(
                detection.config.detection_interval_ms,
            ));
            while detection.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                detection.detector.run_sweep(&detection.cache);
            }
            info!("Detection loop stopped");
        });

        let scoring = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(
                scoring.config.detection_interval_ms,
            ));
            while scoring.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                let detected = scoring.detector.current_opportunities();
                if detected.is_empty() {
                    continue;
                }
                scoring
                    .scoring
                    .score_and_promote(&scoring.cache, &detected, &scoring.active)
                    .await;
            }
            info!("Scoring loop stopped");
        });

        let execution = self.clone();
        tokio::spawn(async move {
            while execution.running.load(Ordering::Relaxed) {
                let best = execution.pop_best().await;
                let Some(opportunity) = best else {
                    sleep(EXECUTION_IDLE_PAUSE).await;
                    continue;
                };
                if !execution.is_opportunity_valid(&opportunity) {
                    debug!(
                        "Discarding stale opportunity '{}' (score {:.3})",
                        opportunity.pair, opportunity.combined_score
                    );
                    continue;
                }
                // Strictly serial: one opportunity in flight at a time.
                if let Err(e) = execution.execute_opportunity(opportunity).await {
                    warn!("Opportunity execution failed: {}", e);
                }
            }
            info!("Execution loop stopped");
        });

        let maintenance = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(
                maintenance.config.maintenance_interval_secs,
            ));
            while maintenance.running.load(Ordering::Relaxed) {
                ticker.tick().await;
                maintenance.expire_active_set().await;
                let _ = maintenance.tx_manager.optimize_fees().await;
                maintenance.tx_manager.cleanup().await;
                maintenance.scan_liquidations().await;
            }
            info!("Maintenance loop stopped");
        });
    }

    /// Cooperative shutdown: clears the running flag; every loop exits at its
    /// next iteration boundary.
    pub fn stop(&self) {
        info!("🛑 Stopping flash loan orchestrator...");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest-estimated-profit entry, removed from the active set.
    async fn pop_best(&self) -> Option<ScoredOpportunity> {
        let mut active = self.active.lock().await;
        let best_key = active
            .iter()
            .max_by(|a, b| {
                a.1.expected_profit
                    .partial_cmp(&b.1.expected_profit)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(key, _)| key.clone())?;
        active.remove(&best_key)
    }

    /// Re-validation at execution time: the promotion is only acted on if it
    /// is still young and, for arbitrage, the same venue pair still shows at
    /// least 80% of the promoted edge in the current detector output.
    fn is_opportunity_valid(&self, opportunity: &ScoredOpportunity) -> bool {
        let now = Utc::now();
        if opportunity.age_secs(now) > self.config.opportunity_ttl_secs as f64 {
            return false;
        }
        match (&opportunity.kind, &opportunity.arbitrage) {
            (OpportunityKind::Arbitrage, Some(raw)) => self
                .detector
                .current_opportunities()
                .iter()
                .any(|current| {
                    current.pair == raw.pair
                        && current.buy_venue == raw.buy_venue
                        && current.sell_venue == raw.sell_venue
                        && current.net_profit_fraction
                            >= raw.net_profit_fraction * REVALIDATION_PROFIT_FACTOR
                }),
            _ => true,
        }
    }

    fn build_instruction(&self, opportunity: &ScoredOpportunity) -> Result<Instruction> {
        let payer = self.tx_manager.payer();
        match opportunity.kind {
            OpportunityKind::Arbitrage => {
                let raw = opportunity.arbitrage.as_ref().ok_or_else(|| {
                    ArbError::ExecutionError(
                        "Arbitrage opportunity carries no market data".to_string(),
                    )
                })?;
                let (base, quote) = split_pair(&raw.pair)?;
                let base_mint = mint_for_symbol(base).ok_or_else(|| {
                    ArbError::InstructionError(format!("Unknown token symbol '{}'", base))
                })?;
                let quote_mint = mint_for_symbol(quote).ok_or_else(|| {
                    ArbError::InstructionError(format!("Unknown token symbol '{}'", quote))
                })?;
                // Buy leg converts quote into base on the cheap venue, the
                // sell leg converts back on the expensive one. Pool accounts
                // are resolved by the program from the route's venue ids.
                let hops = [
                    RouteHop {
                        venue: raw.buy_venue,
                        token_in: quote_mint,
                        token_out: base_mint,
                        pool: Pubkey::default(),
                    },
                    RouteHop {
                        venue: raw.sell_venue,
                        token_in: base_mint,
                        token_out: quote_mint,
                        pool: Pubkey::default(),
                    },
                ];
                let min_profit = (opportunity.expected_profit * MIN_PROFIT_FACTOR).max(0.0) as u64;
                Ok(flash_arbitrage_instruction(
                    self.program_id,
                    payer,
                    opportunity.amount,
                    min_profit,
                    &hops,
                ))
            }
            OpportunityKind::SelfLiquidate => {
                let min_out = (opportunity.expected_profit * MIN_OUT_FACTOR).max(0.0) as u64;
                Ok(flash_self_liquidate_instruction(
                    self.program_id,
                    payer,
                    opportunity.amount,
                    min_out,
                ))
            }
        }
    }

    async fn execute_opportunity(&self, opportunity: ScoredOpportunity) -> Result<Signature> {
        info!(
            "Executing {} opportunity '{}': amount {}, expected profit {:.2}, score {:.3}",
            opportunity.kind,
            opportunity.pair,
            opportunity.amount,
            opportunity.expected_profit,
            opportunity.combined_score
        );
        let instruction = self.build_instruction(&opportunity)?;
        let kind = match opportunity.kind {
            OpportunityKind::Arbitrage => InstructionKind::FlashArbitrage,
            OpportunityKind::SelfLiquidate => InstructionKind::FlashSelfLiquidate,
        };

        match self
            .tx_manager
            .execute(kind, opportunity.amount, instruction)
            .await
        {
            Ok(signature) => {
                let mut stats = self.stats.lock().await;
                stats.opportunities_processed += 1;
                stats.successful_trades += 1;
                stats.total_profit += opportunity.expected_profit;
                drop(stats);

                let mut executed = self.executed.lock().await;
                executed.push(ExecutedOpportunity {
                    signature: signature.to_string(),
                    kind: opportunity.kind,
                    pair: opportunity.pair.clone(),
                    amount: opportunity.amount,
                    expected_profit: opportunity.expected_profit,
                    executed_at: Utc::now(),
                });
                if executed.len() > EXECUTED_HISTORY_CAP {
                    let overflow = executed.len() - EXECUTED_HISTORY_CAP;
                    executed.drain(0..overflow);
                }
                info!("Opportunity executed successfully: {}", signature);
                Ok(signature)
            }
            Err(e) => {
                error!("Failed to execute opportunity '{}': {}", opportunity.pair, e);
                Err(e)
            }
        }
    }

    /// Drops promoted entries older than the active-set TTL.
    async fn expire_active_set(&self) {
        let ttl = self.config.active_set_ttl_secs as f64;
        let now = Utc::now();
        let mut active = self.active.lock().await;
        let before = active.len();
        active.retain(|_, opportunity| opportunity.age_secs(now) <= ttl);
        if active.len() < before {
            debug!("Expired {} active opportunities", before - active.len());
        }
    }

    /// Scans program accounts for liquidatable positions. Position health is
    /// not modeled off-chain yet, so this only reports what it saw.
    async fn scan_liquidations(&self) {
        match self.chain.program_accounts(&self.program_id).await {
            Ok(accounts) => {
                debug!(
                    "Liquidation scan: {} program accounts inspected",
                    accounts.len()
                );
            }
            Err(e) => warn!("Liquidation scan failed: {}", e),
        }
    }

    // === Management surface ===

    pub async fn status(&self) -> OrchestratorStatus {
        let stats = self.stats.lock().await;
        OrchestratorStatus {
            is_running: self.is_running(),
            opportunities_processed: stats.opportunities_processed,
            successful_trades: stats.successful_trades,
            total_profit: stats.total_profit,
            active_opportunities: self.active.lock().await.len(),
            detected_opportunities: self.detector.current_opportunities().len(),
            wallet: self.tx_manager.payer().to_string(),
            program_id: self.program_id.to_string(),
            market: self.cache.market_summary(),
            fees: self.tx_manager.fee_statistics().await,
        }
    }

    /// Current detector output (staleness-filtered).
    pub fn opportunities(&self) -> Vec<RawOpportunity> {
        self.detector.current_opportunities()
    }

    /// Manual execution path for operators. Arbitrage kinds require live
    /// market data for the pair so a real route can be encoded; liquidations
    /// go straight through.
    pub async fn force_execute(
        &self,
        pair: &str,
        amount: u64,
        kind: OpportunityKind,
    ) -> Result<Signature> {
        let arbitrage = match kind {
            OpportunityKind::Arbitrage => Some(
                self.detector
                    .current_opportunities()
                    .into_iter()
                    .find(|opp| opp.pair == pair)
                    .ok_or_else(|| {
                        ArbError::ExecutionError(format!(
                            "No live arbitrage detected for '{}'; cannot build a route",
                            pair
                        ))
                    })?,
            ),
            OpportunityKind::SelfLiquidate => None,
        };
        let opportunity = ScoredOpportunity {
            kind,
            pair: pair.to_string(),
            amount,
            expected_profit: amount as f64 * 0.01,
            risk_score: 0.3,
            ml_confidence: 0.8,
            ml_profit_probability: 0.8,
            anomaly_score: 0.2,
            combined_score: 0.8,
            promoted_at: Utc::now(),
            arbitrage,
        };
        self.execute_opportunity(opportunity).await
    }

    pub async fn fee_statistics(&self) -> FeeStatistics {
        self.tx_manager.fee_statistics().await
    }

    pub async fn transaction_status(&self, signature: &str) -> Option<TransactionRecord> {
        self.tx_manager.transaction_status(signature).await
    }

    pub async fn executed_opportunities(&self) -> Vec<ExecutedOpportunity> {
        self.executed.lock().await.clone()
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &Arc<PriceCache> {
        &self.cache
    }

    #[cfg(test)]
    pub(crate) fn detector(&self) -> &Arc<OpportunityDetector> {
        &self.detector
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> &Arc<Mutex<HashMap<OpportunityKey, ScoredOpportunity>>> {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Venue, VenueQuote};
    use crate::oracle::{AnomalySignals, MarketSnapshot, Prediction};
    use crate::solana::mock::MockChainClient;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct UpbeatPredictor;

    #[async_trait]
    impl ProfitPredictor for UpbeatPredictor {
        async fn predict(&self, _snapshot: &MarketSnapshot) -> Prediction {
            Prediction {
                profit_probability: 0.95,
                confidence: 0.95,
            }
        }
    }

    struct CalmAnomaly;

    #[async_trait]
    impl AnomalyDetector for CalmAnomaly {
        async fn anomaly_signals(&self, _snapshot: &MarketSnapshot) -> AnomalySignals {
            AnomalySignals {
                overall_anomaly: 0.05,
                price_dispersion: 0.0,
                volume_skew: 0.0,
            }
        }
    }

    fn test_orchestrator() -> Arc<Orchestrator> {
        test_orchestrator_with(MockChainClient::default())
    }

    fn test_orchestrator_with(client: MockChainClient) -> Arc<Orchestrator> {
        let config = Arc::new(Config::from_env());
        Orchestrator::new(
            config,
            Arc::new(client),
            Arc::new(Keypair::new()),
            Arc::new(UpbeatPredictor),
            Arc::new(CalmAnomaly),
        )
        .unwrap()
    }

    fn market_quote(venue: Venue, price: f64) -> VenueQuote {
        VenueQuote {
            venue,
            pair: "SOL/USDC".to_string(),
            price,
            volume_24h: 8_000_000.0,
            liquidity: 4_000_000.0,
            spread_fraction: 0.002,
            observed_at: Utc::now(),
        }
    }

    fn scored(pair: &str, expected_profit: f64, raw: Option<RawOpportunity>) -> ScoredOpportunity {
        ScoredOpportunity {
            kind: OpportunityKind::Arbitrage,
            pair: pair.to_string(),
            amount: 100_000,
            expected_profit,
            risk_score: 0.3,
            ml_confidence: 0.9,
            ml_profit_probability: 0.9,
            anomaly_score: 0.1,
            combined_score: 0.8,
            promoted_at: Utc::now(),
            arbitrage: raw,
        }
    }

    fn seed_live_market(orchestrator: &Arc<Orchestrator>) -> RawOpportunity {
        orchestrator
            .cache()
            .upsert(market_quote(Venue::Raydium, 100.0));
        orchestrator.cache().upsert(market_quote(Venue::Orca, 102.0));
        orchestrator.detector().run_sweep(orchestrator.cache());
        orchestrator.opportunities().into_iter().next().unwrap()
    }

    #[tokio::test]
    async fn pop_best_returns_highest_expected_profit() {
        let orchestrator = test_orchestrator();
        {
            let mut active = orchestrator.active().lock().await;
            for (i, profit) in [500.0, 9_000.0, 1_200.0].iter().enumerate() {
                let raw = RawOpportunity {
                    pair: format!("P{}/USDC", i),
                    buy_venue: Venue::Raydium,
                    sell_venue: Venue::Orca,
                    buy_price: 1.0,
                    sell_price: 1.02,
                    net_profit_fraction: 0.012,
                    available_volume: 10_000.0,
                    estimated_profit: *profit,
                    risk_score: 0.2,
                    detected_at: Utc::now(),
                };
                active.insert(raw.key(), scored(&raw.pair.clone(), *profit, Some(raw)));
            }
        }
        let best = orchestrator.pop_best().await.unwrap();
        assert_eq!(best.expected_profit, 9_000.0);
        assert_eq!(orchestrator.active().lock().await.len(), 2);
    }

    #[tokio::test]
    async fn validation_requires_live_detector_support() {
        let orchestrator = test_orchestrator();
        let raw = seed_live_market(&orchestrator);

        // Live market at full strength: valid.
        let candidate = scored("SOL/USDC", raw.estimated_profit, Some(raw.clone()));
        assert!(orchestrator.is_opportunity_valid(&candidate));

        // A promoted edge 2x what the market currently shows: invalid.
        let mut inflated = raw.clone();
        inflated.net_profit_fraction *= 2.0;
        let candidate = scored("SOL/USDC", raw.estimated_profit, Some(inflated));
        assert!(!orchestrator.is_opportunity_valid(&candidate));

        // Expired promotions are invalid regardless of the market.
        let mut old = scored("SOL/USDC", raw.estimated_profit, Some(raw));
        old.promoted_at = Utc::now() - chrono::Duration::seconds(11);
        assert!(!orchestrator.is_opportunity_valid(&old));
    }

    #[tokio::test]
    async fn executing_an_opportunity_updates_counters_and_history() {
        let orchestrator = test_orchestrator();
        let raw = seed_live_market(&orchestrator);
        let candidate = scored("SOL/USDC", 6_000.0, Some(raw));

        let signature = orchestrator.execute_opportunity(candidate).await.unwrap();
        let status = orchestrator.status().await;
        assert_eq!(status.opportunities_processed, 1);
        assert_eq!(status.successful_trades, 1);
        assert!((status.total_profit - 6_000.0).abs() < 1e-9);

        let executed = orchestrator.executed_opportunities().await;
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].signature, signature.to_string());
    }

    #[tokio::test]
    async fn failed_execution_leaves_counters_untouched() {
        let orchestrator = test_orchestrator_with(MockChainClient {
            simulation_error: Some("slippage exceeded".to_string()),
            ..Default::default()
        });
        let raw = seed_live_market(&orchestrator);
        let candidate = scored("SOL/USDC", 6_000.0, Some(raw));

        assert!(orchestrator.execute_opportunity(candidate).await.is_err());
        let status = orchestrator.status().await;
        assert_eq!(status.opportunities_processed, 0);
        assert_eq!(status.successful_trades, 0);
        assert!(orchestrator.executed_opportunities().await.is_empty());
    }

    #[tokio::test]
    async fn force_execute_arbitrage_needs_live_market_data() {
        let orchestrator = test_orchestrator();
        let err = orchestrator
            .force_execute("SOL/USDC", 50_000, OpportunityKind::Arbitrage)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::ExecutionError(_)));

        seed_live_market(&orchestrator);
        assert!(orchestrator
            .force_execute("SOL/USDC", 50_000, OpportunityKind::Arbitrage)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn force_execute_self_liquidation_skips_route_building() {
        let orchestrator = test_orchestrator();
        assert!(orchestrator
            .force_execute("SOL/USDC", 50_000, OpportunityKind::SelfLiquidate)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn active_set_expiry_prunes_old_promotions() {
        let orchestrator = test_orchestrator();
        {
            let mut active = orchestrator.active().lock().await;
            let mut fresh = scored("SOL/USDC", 100.0, None);
            fresh.promoted_at = Utc::now();
            let mut stale = scored("RAY/USDC", 100.0, None);
            stale.promoted_at = Utc::now() - chrono::Duration::minutes(6);
            active.insert(
                OpportunityKey {
                    pair: "SOL/USDC".to_string(),
                    buy_venue: Venue::Raydium,
                    sell_venue: Venue::Orca,
                },
                fresh,
            );
            active.insert(
                OpportunityKey {
                    pair: "RAY/USDC".to_string(),
                    buy_venue: Venue::Raydium,
                    sell_venue: Venue::Orca,
                },
                stale,
            );
        }
        orchestrator.expire_active_set().await;
        let active = orchestrator.active().lock().await;
        assert_eq!(active.len(), 1);
        assert!(active.keys().all(|k| k.pair == "SOL/USDC"));
    }

    #[tokio::test]
    async fn stop_clears_the_running_flag() {
        let orchestrator = test_orchestrator();
        assert!(!orchestrator.is_running());
        orchestrator.start();
        assert!(orchestrator.is_running());
        orchestrator.stop();
        assert!(!orchestrator.is_running());
    }
}
