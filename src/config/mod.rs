use crate::error::{ArbError, Result};
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;

/// Flash loan program this bot is bound to. Overridable via `PROGRAM_ID`.
pub const DEFAULT_PROGRAM_ID: &str = "FLashLoanSys11111111111111111111111111111111";

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub rpc_url_backup: Option<Vec<String>>,
    pub rpc_max_retries: usize,
    pub rpc_retry_delay_ms: u64,
    pub trader_wallet_keypair_path: String,
    pub program_id: String,

    // Venue ingestion & detection
    pub venue_poll_interval_secs: u64,
    pub detection_interval_ms: u64,
    pub quote_freshness_secs: u64,
    pub opportunity_ttl_secs: u64,
    pub min_profit_fraction: f64,

    // Scoring & promotion
    pub oracle_timeout_secs: u64,
    pub promotion_threshold: f64,
    pub active_set_ttl_secs: u64,

    // Transaction fees
    pub flash_loan_fee_rate_bps: u64,
    pub max_user_fee_lamports: u64,
    pub initial_priority_multiplier: f64,
    pub loan_covers_fee_overage: bool,
    pub max_loan_amount: u64,

    // Maintenance
    pub maintenance_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            rpc_url: env::var("RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string()),
            rpc_url_backup: env::var("RPC_URL_BACKUP")
                .ok()
                .map(|s| s.split(',').map(String::from).collect()),
            rpc_max_retries: env::var("RPC_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            rpc_retry_delay_ms: env::var("RPC_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            trader_wallet_keypair_path: env::var("TRADER_WALLET_KEYPAIR_PATH")
                .unwrap_or_else(|_| ".config/solana/id.json".to_string()),
            program_id: env::var("PROGRAM_ID").unwrap_or_else(|_| DEFAULT_PROGRAM_ID.to_string()),
            venue_poll_interval_secs: env::var("VENUE_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            detection_interval_ms: env::var("DETECTION_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            quote_freshness_secs: env::var("QUOTE_FRESHNESS_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            opportunity_ttl_secs: env::var("OPPORTUNITY_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            min_profit_fraction: env::var("MIN_PROFIT_FRACTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.005),
            oracle_timeout_secs: env::var("ORACLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            promotion_threshold: env::var("PROMOTION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.7),
            active_set_ttl_secs: env::var("ACTIVE_SET_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            flash_loan_fee_rate_bps: env::var("FLASH_LOAN_FEE_RATE_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_user_fee_lamports: env::var("MAX_USER_FEE_LAMPORTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100_000),
            initial_priority_multiplier: env::var("PRIORITY_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.5),
            loan_covers_fee_overage: env::var("LOAN_COVERS_FEE_OVERAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            max_loan_amount: env::var("MAX_LOAN_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_000_000_000_000),
            maintenance_interval_secs: env::var("MAINTENANCE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    /// Parsed program binding. Missing/invalid program id is fatal at startup.
    pub fn program_pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.program_id)
            .map_err(|e| ArbError::ConfigError(format!("Invalid PROGRAM_ID '{}': {}", self.program_id, e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(ArbError::ConfigError("RPC_URL cannot be empty".to_string()));
        }
        if self.trader_wallet_keypair_path.is_empty() {
            return Err(ArbError::ConfigError(
                "TRADER_WALLET_KEYPAIR_PATH cannot be empty".to_string(),
            ));
        }
        self.program_pubkey()?;
        if !(0.0..=1.0).contains(&self.promotion_threshold) {
            return Err(ArbError::ConfigError(format!(
                "PROMOTION_THRESHOLD must be within [0,1], got {}",
                self.promotion_threshold
            )));
        }
        log::info!("Application configuration loaded: {:?}", self);
        Ok(())
    }
}
