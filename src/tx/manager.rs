use crate::error::{ArbError, Result};
use crate::solana::ChainClient;
use crate::tx::fees::{FeeEstimator, FeePolicy, InstructionKind, BASE_FEE_LAMPORTS};
use crate::tx::instructions::wrap_with_fee_instructions;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{info, warn};
use serde::Serialize;
use solana_sdk::{
    instruction::Instruction,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct TxManagerSettings {
    pub max_submit_attempts: u32,
    pub submit_retry_delay: Duration,
    pub confirm_poll_interval: Duration,
    pub confirm_timeout: Duration,
    pub retention: ChronoDuration,
    pub history_cap: usize,
}

impl Default for TxManagerSettings {
    fn default() -> Self {
        Self {
            max_submit_attempts: 3,
            submit_retry_delay: Duration::from_secs(1),
            confirm_poll_interval: Duration::from_secs(2),
            confirm_timeout: Duration::from_secs(30),
            retention: ChronoDuration::hours(24),
            history_cap: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub kind: InstructionKind,
    pub amount: u64,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    fn new(signature: String, kind: InstructionKind, amount: u64, status: TxStatus) -> Self {
        Self {
            signature,
            kind,
            amount,
            status,
            created_at: Utc::now(),
        }
    }

    /// Confirmed and Failed are terminal; attempts to leave them are ignored.
    pub fn transition(&mut self, next: TxStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeOptimization {
    pub success_rate: f64,
    pub priority_multiplier: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeStatistics {
    pub period_hours: u32,
    pub total_transactions: usize,
    pub successful_transactions: usize,
    pub success_rate: f64,
    pub estimated_total_fees: u64,
    pub current_priority_multiplier: f64,
    pub max_user_fee_limit: u64,
    pub pending_transactions: usize,
}

/// Owns the full lifecycle of every transaction the bot submits: per-attempt
/// cost estimation, fee wrapping, the send/confirm/retry protocol, and the
/// bounded in-memory record of what happened.
pub struct TransactionManager {
    client: Arc<dyn ChainClient>,
    wallet: Arc<Keypair>,
    policy: Arc<RwLock<FeePolicy>>,
    estimator: FeeEstimator,
    settings: TxManagerSettings,
    pending: Mutex<HashMap<String, TransactionRecord>>,
    history: Mutex<VecDeque<TransactionRecord>>,
}

impl TransactionManager {
    pub fn new(
        client: Arc<dyn ChainClient>,
        wallet: Arc<Keypair>,
        policy: Arc<RwLock<FeePolicy>>,
        fee_rate_bps: u64,
        settings: TxManagerSettings,
    ) -> Self {
        let estimator = FeeEstimator::new(policy.clone(), fee_rate_bps);
        Self {
            client,
            wallet,
            policy,
            estimator,
            settings,
            pending: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn payer(&self) -> solana_sdk::pubkey::Pubkey {
        self.wallet.pubkey()
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Executes one program call with fee wrapping and the full
    /// send/confirm/retry protocol.
    ///
    /// Per attempt: estimate costs, wrap instructions, fetch a blockhash
    /// (failure aborts without sending), sign, simulate (a simulation error
    /// marks the attempt Failed and aborts — the same instruction set is not
    /// retried), send, then poll confirmation. Send-level errors and
    /// confirmation timeouts consume one of the submit attempts; each new
    /// attempt is an independent transaction.
    pub async fn execute(
        &self,
        kind: InstructionKind,
        amount: u64,
        program_ix: Instruction,
    ) -> Result<Signature> {
        let mut last_error: Option<ArbError> = None;

        for attempt in 1..=self.settings.max_submit_attempts {
            let cost = self
                .estimator
                .estimate(self.client.as_ref(), kind, amount)
                .await?;
            let policy_snapshot = self.policy.read().await.clone();
            let payer = self.wallet.pubkey();
            let instructions = wrap_with_fee_instructions(
                program_ix.clone(),
                payer,
                &cost,
                &policy_snapshot,
            );
            info!(
                "Attempt {}/{} for {}: user pays {} lamports, loan covers {} lamports",
                attempt,
                self.settings.max_submit_attempts,
                kind,
                crate::tx::instructions::user_fee(&cost, &policy_snapshot),
                cost.total_cost
                    .saturating_sub(crate::tx::instructions::user_fee(&cost, &policy_snapshot)),
            );

            // Blockhash failure aborts the whole execution: nothing was sent.
            let blockhash = self.client.latest_blockhash().await?;

            let transaction = Transaction::new_signed_with_payer(
                &instructions,
                Some(&payer),
                &[&*self.wallet],
                blockhash,
            );
            let signature = transaction.signatures[0];

            let simulation = self.client.simulate_transaction(&transaction).await?;
            if let Some(sim_err) = simulation.err {
                warn!("Simulation rejected {} transaction: {}", kind, sim_err);
                self.track(TransactionRecord::new(
                    signature.to_string(),
                    kind,
                    amount,
                    TxStatus::Failed,
                ))
                .await;
                return Err(ArbError::SimulationFailed(sim_err));
            }

            let signature = match self.client.send_transaction(&transaction).await {
                Ok(sig) => sig,
                Err(e) => {
                    warn!(
                        "Send attempt {}/{} failed: {}",
                        attempt, self.settings.max_submit_attempts, e
                    );
                    last_error = Some(e);
                    if attempt < self.settings.max_submit_attempts {
                        sleep(self.settings.submit_retry_delay).await;
                    }
                    continue;
                }
            };

            self.track(TransactionRecord::new(
                signature.to_string(),
                kind,
                amount,
                TxStatus::Pending,
            ))
            .await;
            info!("Transaction sent: {} (attempt {})", signature, attempt);

            if self.await_confirmation(&signature).await {
                self.mark(&signature.to_string(), TxStatus::Confirmed).await;
                info!("Transaction confirmed: {}", signature);
                return Ok(signature);
            }

            warn!("Transaction confirmation timeout: {}", signature);
            self.mark(&signature.to_string(), TxStatus::Failed).await;
            last_error = Some(ArbError::ConfirmationTimeout(signature.to_string()));
            if attempt < self.settings.max_submit_attempts {
                sleep(self.settings.submit_retry_delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ArbError::TransactionError("Submit attempts exhausted".to_string())
        }))
    }

    /// Polls confirmation every poll interval until the timeout elapses.
    /// Poll-level RPC errors are logged and treated as "not yet confirmed".
    async fn await_confirmation(&self, signature: &Signature) -> bool {
        let started = tokio::time::Instant::now();
        loop {
            match self.client.confirm_transaction(signature).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!("Confirmation poll for {} failed: {}", signature, e),
            }
            if started.elapsed() >= self.settings.confirm_timeout {
                return false;
            }
            sleep(self.settings.confirm_poll_interval).await;
        }
    }

    async fn track(&self, record: TransactionRecord) {
        if record.status.is_terminal() {
            self.push_history(record.clone()).await;
        }
        self.pending
            .lock()
            .await
            .insert(record.signature.clone(), record);
    }

    async fn mark(&self, signature: &str, status: TxStatus) {
        let snapshot = {
            let mut pending = self.pending.lock().await;
            pending.get_mut(signature).and_then(|record| {
                if record.transition(status) && status.is_terminal() {
                    Some(record.clone())
                } else {
                    None
                }
            })
        };
        if let Some(record) = snapshot {
            self.push_history(record).await;
        }
    }

    async fn push_history(&self, record: TransactionRecord) {
        let mut history = self.history.lock().await;
        history.push_back(record);
        while history.len() > self.settings.history_cap {
            history.pop_front();
        }
    }

    /// Adaptive fee optimization over the retained history. Returns `None`
    /// when there is nothing recent to learn from.
    pub async fn optimize_fees(&self) -> Option<FeeOptimization> {
        let cutoff = Utc::now() - self.settings.retention;
        let (total, successes) = {
            let history = self.history.lock().await;
            let recent: Vec<&TransactionRecord> =
                history.iter().filter(|r| r.created_at > cutoff).collect();
            if recent.is_empty() {
                return None;
            }
            let successes = recent
                .iter()
                .filter(|r| r.status == TxStatus::Confirmed)
                .count();
            (recent.len(), successes)
        };

        let success_rate = successes as f64 / total as f64;
        let mut policy = self.policy.write().await;
        let before = policy.priority_multiplier;
        policy.adjust_for_success_rate(success_rate);
        if (policy.priority_multiplier - before).abs() > f64::EPSILON {
            info!(
                "Priority multiplier adjusted {:.3} -> {:.3} (24h success rate {:.1}%)",
                before,
                policy.priority_multiplier,
                success_rate * 100.0
            );
        }
        Some(FeeOptimization {
            success_rate,
            priority_multiplier: policy.priority_multiplier,
            sample_size: total,
        })
    }

    /// Drops pending entries and history older than the retention window and
    /// re-applies the history cap.
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.settings.retention;
        let removed = {
            let mut pending = self.pending.lock().await;
            let before = pending.len();
            pending.retain(|_, record| record.created_at > cutoff);
            before - pending.len()
        };
        let mut history = self.history.lock().await;
        history.retain(|record| record.created_at > cutoff);
        while history.len() > self.settings.history_cap {
            history.pop_front();
        }
        if removed > 0 {
            info!(
                "Cleaned up {} expired pending transactions, {} retained in history",
                removed,
                history.len()
            );
        }
    }

    pub async fn fee_statistics(&self) -> FeeStatistics {
        let cutoff = Utc::now() - self.settings.retention;
        let policy = self.policy.read().await.clone();
        let history = self.history.lock().await;
        let recent: Vec<&TransactionRecord> =
            history.iter().filter(|r| r.created_at > cutoff).collect();
        let successful: Vec<&&TransactionRecord> = recent
            .iter()
            .filter(|r| r.status == TxStatus::Confirmed)
            .collect();

        // Estimated, not measured: attempts paid base + priority at the
        // current multiplier plus the protocol's cut of the amount.
        let estimated_total_fees: u64 = successful
            .iter()
            .map(|r| {
                let priority = (BASE_FEE_LAMPORTS as f64 * policy.priority_multiplier) as u64;
                BASE_FEE_LAMPORTS + priority + self.estimator.protocol_fee(r.amount)
            })
            .sum();

        FeeStatistics {
            period_hours: 24,
            total_transactions: recent.len(),
            successful_transactions: successful.len(),
            success_rate: if recent.is_empty() {
                0.0
            } else {
                successful.len() as f64 / recent.len() as f64
            },
            estimated_total_fees,
            current_priority_multiplier: policy.priority_multiplier,
            max_user_fee_limit: policy.max_user_fee,
            pending_transactions: self.pending.lock().await.len(),
        }
    }

    /// Looks a signature up in the pending map, then history, then the chain.
    /// A pending entry is re-polled once so operators see fresh status.
    pub async fn transaction_status(&self, signature: &str) -> Option<TransactionRecord> {
        let pending_status = {
            let pending = self.pending.lock().await;
            pending.get(signature).cloned()
        };
        if let Some(record) = pending_status {
            if record.status == TxStatus::Pending {
                if let Ok(sig) = signature.parse::<Signature>() {
                    if let Ok(true) = self.client.confirm_transaction(&sig).await {
                        self.mark(signature, TxStatus::Confirmed).await;
                        return self.pending.lock().await.get(signature).cloned();
                    }
                }
            }
            return Some(record);
        }

        if let Some(record) = self
            .history
            .lock()
            .await
            .iter()
            .find(|r| r.signature == signature)
        {
            return Some(record.clone());
        }

        if let Ok(sig) = signature.parse::<Signature>() {
            if let Ok(Some(_info)) = self.client.get_transaction(&sig).await {
                return Some(TransactionRecord::new(
                    signature.to_string(),
                    InstructionKind::Other,
                    0,
                    TxStatus::Confirmed,
                ));
            }
        }
        None
    }

    #[cfg(test)]
    pub async fn seed_history(&self, records: Vec<TransactionRecord>) {
        let mut history = self.history.lock().await;
        history.extend(records);
    }

    #[cfg(test)]
    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }

    #[cfg(test)]
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    #[cfg(test)]
    pub async fn history_statuses(&self) -> Vec<TxStatus> {
        self.history.lock().await.iter().map(|r| r.status).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solana::mock::MockChainClient;
    use crate::tx::instructions::flash_self_liquidate_instruction;
    use pretty_assertions::assert_eq;
    use solana_sdk::pubkey::Pubkey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager_with(client: MockChainClient) -> TransactionManager {
        manager_with_shared(Arc::new(client))
    }

    fn manager_with_shared(client: Arc<MockChainClient>) -> TransactionManager {
        let policy = Arc::new(RwLock::new(FeePolicy::new(100_000, 1.5, true)));
        TransactionManager::new(
            client,
            Arc::new(Keypair::new()),
            policy,
            30,
            TxManagerSettings::default(),
        )
    }

    fn program_ix(payer: Pubkey) -> Instruction {
        flash_self_liquidate_instruction(Pubkey::new_unique(), payer, 1_000, 900)
    }

    #[tokio::test(start_paused = true)]
    async fn successful_execution_records_confirmed_transaction() {
        let manager = manager_with(MockChainClient::default());
        let ix = program_ix(manager.payer());
        let signature = manager
            .execute(InstructionKind::FlashArbitrage, 1_000_000, ix)
            .await
            .unwrap();

        let record = manager
            .transaction_status(&signature.to_string())
            .await
            .unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(manager.history_len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_error_aborts_without_sending() {
        let client = Arc::new(MockChainClient {
            simulation_error: Some("custom program error: 0x1771".to_string()),
            ..Default::default()
        });
        let manager = manager_with_shared(client.clone());
        let ix = program_ix(manager.payer());
        let err = manager
            .execute(InstructionKind::FlashArbitrage, 1_000_000, ix)
            .await
            .unwrap_err();

        assert!(matches!(err, ArbError::SimulationFailed(_)));
        // No sends happened and the failed attempt is on the books.
        assert_eq!(client.sends.load(Ordering::SeqCst), 0);
        assert_eq!(manager.history_statuses().await, vec![TxStatus::Failed]);
    }

    #[tokio::test(start_paused = true)]
    async fn blockhash_failure_aborts_before_any_tracking() {
        let client = MockChainClient {
            blockhash_fails: true,
            ..Default::default()
        };
        let manager = manager_with(client);
        let ix = program_ix(manager.payer());
        let err = manager
            .execute(InstructionKind::FlashArbitrage, 1_000_000, ix)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::RpcError(_)));
        assert_eq!(manager.pending_len().await, 0);
        assert_eq!(manager.history_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_errors_are_retried_up_to_three_attempts() {
        let client = MockChainClient {
            send_failures: AtomicUsize::new(2),
            ..Default::default()
        };
        let manager = manager_with(client);
        let ix = program_ix(manager.payer());
        let signature = manager
            .execute(InstructionKind::FlashArbitrage, 1_000_000, ix)
            .await
            .unwrap();
        assert!(!signature.to_string().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_send_retries_return_the_last_error() {
        let client = MockChainClient {
            send_failures: AtomicUsize::new(10),
            ..Default::default()
        };
        let manager = manager_with(client);
        let ix = program_ix(manager.payer());
        let err = manager
            .execute(InstructionKind::FlashArbitrage, 1_000_000, ix)
            .await
            .unwrap_err();
        assert!(matches!(err, ArbError::TransactionError(_)));
        assert_eq!(manager.pending_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_marks_failed_and_retries_as_new_transaction() {
        let client = MockChainClient {
            confirm_after_polls: None,
            ..Default::default()
        };
        let manager = manager_with(client);
        let ix = program_ix(manager.payer());
        let err = manager
            .execute(InstructionKind::FlashArbitrage, 1_000_000, ix)
            .await
            .unwrap_err();

        assert!(matches!(err, ArbError::ConfirmationTimeout(_)));
        // Three independent attempts, each with its own Failed record.
        assert_eq!(
            manager.history_statuses().await,
            vec![TxStatus::Failed, TxStatus::Failed, TxStatus::Failed]
        );
    }

    #[test]
    fn terminal_statuses_never_change() {
        let mut record = TransactionRecord::new(
            "sig".to_string(),
            InstructionKind::FlashArbitrage,
            100,
            TxStatus::Pending,
        );
        assert!(record.transition(TxStatus::Confirmed));
        assert!(!record.transition(TxStatus::Failed));
        assert_eq!(record.status, TxStatus::Confirmed);

        let mut failed = TransactionRecord::new(
            "sig2".to_string(),
            InstructionKind::FlashArbitrage,
            100,
            TxStatus::Failed,
        );
        assert!(!failed.transition(TxStatus::Confirmed));
        assert_eq!(failed.status, TxStatus::Failed);
    }

    fn record(status: TxStatus, age_hours: i64) -> TransactionRecord {
        let mut r = TransactionRecord::new(
            Signature::new_unique().to_string(),
            InstructionKind::FlashArbitrage,
            1_000_000,
            status,
        );
        r.created_at = Utc::now() - ChronoDuration::hours(age_hours);
        r
    }

    #[tokio::test]
    async fn optimizer_raises_multiplier_on_poor_delivery() {
        let manager = manager_with(MockChainClient::default());
        let mut records = vec![record(TxStatus::Confirmed, 1)];
        records.extend((0..4).map(|_| record(TxStatus::Failed, 1)));
        manager.seed_history(records).await;

        let report = manager.optimize_fees().await.unwrap();
        assert!((report.success_rate - 0.2).abs() < 1e-12);
        assert!((report.priority_multiplier - 1.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn optimizer_relaxes_multiplier_on_excellent_delivery() {
        let manager = manager_with(MockChainClient::default());
        manager
            .seed_history((0..20).map(|_| record(TxStatus::Confirmed, 1)).collect())
            .await;
        let report = manager.optimize_fees().await.unwrap();
        assert!((report.priority_multiplier - 1.425).abs() < 1e-9);
    }

    #[tokio::test]
    async fn optimizer_skips_when_history_is_empty_or_stale() {
        let manager = manager_with(MockChainClient::default());
        assert!(manager.optimize_fees().await.is_none());
        manager
            .seed_history(vec![record(TxStatus::Confirmed, 48)])
            .await;
        assert!(manager.optimize_fees().await.is_none());
    }

    #[tokio::test]
    async fn cleanup_prunes_by_age_and_caps_history() {
        let manager = manager_with(MockChainClient::default());
        let mut records: Vec<TransactionRecord> =
            (0..150).map(|_| record(TxStatus::Confirmed, 1)).collect();
        records.extend((0..10).map(|_| record(TxStatus::Confirmed, 30)));
        manager.seed_history(records).await;

        manager.cleanup().await;
        assert_eq!(manager.history_len().await, 100);
    }

    #[tokio::test]
    async fn fee_statistics_summarize_recent_history() {
        let manager = manager_with(MockChainClient::default());
        let mut records = vec![record(TxStatus::Failed, 2)];
        records.extend((0..3).map(|_| record(TxStatus::Confirmed, 2)));
        manager.seed_history(records).await;

        let stats = manager.fee_statistics().await;
        assert_eq!(stats.total_transactions, 4);
        assert_eq!(stats.successful_transactions, 3);
        assert!((stats.success_rate - 0.75).abs() < 1e-12);
        // Per confirmed tx: 5000 base + 7500 priority + 3000 protocol.
        assert_eq!(stats.estimated_total_fees, 3 * (5_000 + 7_500 + 3_000));
    }

    #[tokio::test]
    async fn unknown_signatures_resolve_to_none() {
        let manager = manager_with(MockChainClient::default());
        let sig = Signature::new_unique().to_string();
        assert!(manager.transaction_status(&sig).await.is_none());
    }
}
