//! Blockchain client seam: the rest of the bot talks to `ChainClient`, the
//! production implementation lives in `rpc`.

pub mod rpc;

pub use rpc::{ChainClient, ChainTransactionInfo, RpcChainClient, SimulationOutcome};

#[cfg(test)]
pub mod mock {
    use super::{ChainClient, ChainTransactionInfo, SimulationOutcome};
    use crate::error::{ArbError, Result};
    use async_trait::async_trait;
    use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted chain client for exercising the transaction manager's
    /// send/confirm/retry protocol without a validator.
    pub struct MockChainClient {
        pub blockhash_fails: bool,
        pub simulation_error: Option<String>,
        /// Number of send attempts that fail before one succeeds.
        pub send_failures: AtomicUsize,
        /// Confirmation polls that return false before `true`; `None` never
        /// confirms.
        pub confirm_after_polls: Option<usize>,
        pub slot: u64,
        pub sends: AtomicUsize,
        pub simulations: AtomicUsize,
        pub confirm_polls: AtomicUsize,
    }

    impl Default for MockChainClient {
        fn default() -> Self {
            Self {
                blockhash_fails: false,
                simulation_error: None,
                send_failures: AtomicUsize::new(0),
                confirm_after_polls: Some(0),
                slot: 42,
                sends: AtomicUsize::new(0),
                simulations: AtomicUsize::new(0),
                confirm_polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChainClient for MockChainClient {
        async fn latest_blockhash(&self) -> Result<Hash> {
            if self.blockhash_fails {
                return Err(ArbError::RpcError("blockhash unavailable".to_string()));
            }
            Ok(Hash::new_unique())
        }

        async fn slot(&self) -> Result<u64> {
            Ok(self.slot)
        }

        async fn simulate_transaction(&self, _tx: &Transaction) -> Result<SimulationOutcome> {
            self.simulations.fetch_add(1, Ordering::SeqCst);
            Ok(SimulationOutcome {
                err: self.simulation_error.clone(),
                units_consumed: Some(150_000),
                logs: vec![],
            })
        }

        async fn send_transaction(&self, _tx: &Transaction) -> Result<Signature> {
            let attempt = self.sends.fetch_add(1, Ordering::SeqCst);
            if attempt < self.send_failures.load(Ordering::SeqCst) {
                return Err(ArbError::TransactionError(
                    "node rejected the transaction".to_string(),
                ));
            }
            Ok(Signature::new_unique())
        }

        async fn confirm_transaction(&self, _signature: &Signature) -> Result<bool> {
            let poll = self.confirm_polls.fetch_add(1, Ordering::SeqCst);
            match self.confirm_after_polls {
                Some(required) => Ok(poll >= required),
                None => Ok(false),
            }
        }

        async fn get_transaction(
            &self,
            _signature: &Signature,
        ) -> Result<Option<ChainTransactionInfo>> {
            Ok(None)
        }

        async fn program_accounts(&self, _program_id: &Pubkey) -> Result<Vec<(Pubkey, Vec<u8>)>> {
            Ok(vec![])
        }
    }
}
