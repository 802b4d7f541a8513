use crate::error::{ArbError, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rand::Rng;
use solana_client::{
    nonblocking::rpc_client::RpcClient as NonBlockingRpcClient,
    rpc_config::RpcSimulateTransactionConfig,
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::UiTransactionEncoding;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_COMMITMENT: CommitmentConfig = CommitmentConfig::confirmed();

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub err: Option<String>,
    pub units_consumed: Option<u64>,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ChainTransactionInfo {
    pub slot: u64,
    pub block_time: Option<i64>,
}

/// The network operations the bot consumes, abstracted so tests can script
/// chain behavior.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash>;
    async fn slot(&self) -> Result<u64>;
    async fn simulate_transaction(&self, tx: &Transaction) -> Result<SimulationOutcome>;
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature>;
    async fn confirm_transaction(&self, signature: &Signature) -> Result<bool>;
    async fn get_transaction(&self, signature: &Signature) -> Result<Option<ChainTransactionInfo>>;
    async fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<(Pubkey, Vec<u8>)>>;
}

/// High-availability RPC client: retries the primary endpoint with jittered
/// delays, then walks the fallback endpoints.
pub struct RpcChainClient {
    primary_client: Arc<NonBlockingRpcClient>,
    fallback_clients: Vec<Arc<NonBlockingRpcClient>>,
    max_retries: usize,
    retry_delay: Duration,
}

impl RpcChainClient {
    pub fn new(
        primary_endpoint: &str,
        fallback_endpoints: Vec<String>,
        max_retries: usize,
        retry_delay: Duration,
    ) -> Self {
        let primary_client = Arc::new(NonBlockingRpcClient::new_with_commitment(
            primary_endpoint.to_string(),
            DEFAULT_COMMITMENT,
        ));
        let fallback_clients = fallback_endpoints
            .iter()
            .map(|url| {
                Arc::new(NonBlockingRpcClient::new_with_commitment(
                    url.clone(),
                    DEFAULT_COMMITMENT,
                ))
            })
            .collect();
        Self {
            primary_client,
            fallback_clients,
            max_retries,
            retry_delay,
        }
    }

    async fn execute_with_retry_and_fallback<F, Fut, T>(
        &self,
        operation_name: &str,
        mut rpc_call_fn: F,
    ) -> Result<T>
    where
        F: FnMut(Arc<NonBlockingRpcClient>) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, solana_client::client_error::ClientError>>
            + Send,
        T: Send,
    {
        let mut last_error: Option<solana_client::client_error::ClientError> = None;

        for attempt in 0..self.max_retries {
            match rpc_call_fn(Arc::clone(&self.primary_client)).await {
                Ok(result) => {
                    debug!(
                        "[RPC - {}] Primary endpoint succeeded on attempt {}",
                        operation_name,
                        attempt + 1
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "[RPC - {}] Primary attempt {}/{} failed: {}",
                        operation_name,
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries - 1 {
                        let mut delay_ms = self.retry_delay.as_millis() as u64;
                        if delay_ms > 0 {
                            let jitter = rand::thread_rng().gen_range(0..(delay_ms / 4).max(1));
                            delay_ms += jitter;
                        }
                        sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        for (i, fallback_client) in self.fallback_clients.iter().enumerate() {
            debug!(
                "[RPC - {}] Attempting fallback endpoint #{}",
                operation_name,
                i + 1
            );
            match rpc_call_fn(Arc::clone(fallback_client)).await {
                Ok(result) => {
                    info!(
                        "[RPC - {}] Fallback endpoint #{} succeeded",
                        operation_name,
                        i + 1
                    );
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        "[RPC - {}] Fallback endpoint #{} failed: {}",
                        operation_name,
                        i + 1,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let message = format!("[RPC - {}] All RPC attempts failed", operation_name);
        error!("{}", message);
        Err(match last_error {
            Some(e) => ArbError::RpcError(format!("{}: {}", message, e)),
            None => ArbError::RpcError(message),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn latest_blockhash(&self) -> Result<Hash> {
        self.execute_with_retry_and_fallback("get_latest_blockhash", |client| async move {
            client.get_latest_blockhash().await
        })
        .await
    }

    async fn slot(&self) -> Result<u64> {
        self.execute_with_retry_and_fallback("get_slot", |client| async move {
            client.get_slot().await
        })
        .await
    }

    async fn simulate_transaction(&self, tx: &Transaction) -> Result<SimulationOutcome> {
        let sim_config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(DEFAULT_COMMITMENT),
            encoding: Some(UiTransactionEncoding::Base64),
            accounts: None,
            min_context_slot: None,
            inner_instructions: false,
        };
        let response = self
            .execute_with_retry_and_fallback("simulate_transaction", |client| {
                let config = sim_config.clone();
                async move {
                    client
                        .simulate_transaction_with_config(tx, config)
                        .await
                }
            })
            .await?;
        Ok(SimulationOutcome {
            err: response.value.err.map(|e| format!("{:?}", e)),
            units_consumed: response.value.units_consumed,
            logs: response.value.logs.unwrap_or_default(),
        })
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature> {
        // No internal retry here: the transaction manager owns the submit
        // retry budget.
        self.primary_client
            .send_transaction(tx)
            .await
            .map_err(|e| ArbError::TransactionError(e.to_string()))
    }

    async fn confirm_transaction(&self, signature: &Signature) -> Result<bool> {
        self.primary_client
            .confirm_transaction(signature)
            .await
            .map_err(|e| ArbError::RpcError(e.to_string()))
    }

    async fn get_transaction(&self, signature: &Signature) -> Result<Option<ChainTransactionInfo>> {
        match self
            .primary_client
            .get_transaction(signature, UiTransactionEncoding::Json)
            .await
        {
            Ok(tx) => Ok(Some(ChainTransactionInfo {
                slot: tx.slot,
                block_time: tx.block_time,
            })),
            Err(e) => {
                debug!("get_transaction({}) returned nothing: {}", signature, e);
                Ok(None)
            }
        }
    }

    async fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        self.execute_with_retry_and_fallback("get_program_accounts", |client| async move {
            client
                .get_program_accounts(program_id)
                .await
                .map(|accounts| {
                    accounts
                        .into_iter()
                        .map(|(pubkey, account)| (pubkey, account.data))
                        .collect()
                })
        })
        .await
    }
}
