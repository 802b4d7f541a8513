use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ArbError {
    /// Venue quote fetch / generic connectivity failure
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// Solana RPC errors
    #[error("RPC Error: {0}")]
    RpcError(String),

    /// Scoring oracle failed or exceeded its deadline
    #[error("Oracle Error: {0}")]
    OracleError(String),

    /// Operation-level timeout
    #[error("Timeout Error: {0}")]
    TimeoutError(String),

    /// Opportunity rejected by a validity check (stale, below threshold, ...)
    #[error("Validation Error: {0}")]
    ValidationError(String),

    /// Instruction building errors
    #[error("Instruction Error: {0}")]
    InstructionError(String),

    /// Pre-flight simulation rejected the transaction
    #[error("Simulation Failed: {0}")]
    SimulationFailed(String),

    /// Send-level transaction errors
    #[error("Transaction Error: {0}")]
    TransactionError(String),

    /// Transaction was sent but never reached a confirmed state in time
    #[error("Confirmation Timeout: {0}")]
    ConfirmationTimeout(String),

    /// Trade execution errors above the transaction layer
    #[error("Execution Error: {0}")]
    ExecutionError(String),

    /// Parsing errors for venue or chain data
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Fatal configuration errors; the orchestrator must not start
    #[error("Configuration Error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for ArbError {
    fn from(err: serde_json::Error) -> Self {
        ArbError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<anyhow::Error> for ArbError {
    fn from(err: anyhow::Error) -> Self {
        ArbError::ConfigError(format!("Anyhow error: {}", err))
    }
}

impl From<solana_client::client_error::ClientError> for ArbError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        ArbError::RpcError(format!("Solana client error: {}", err))
    }
}

impl From<reqwest::Error> for ArbError {
    fn from(err: reqwest::Error) -> Self {
        ArbError::NetworkError(format!("HTTP error: {}", err))
    }
}

impl ArbError {
    /// Determines if an error is recoverable through retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            ArbError::NetworkError(_) => true,
            ArbError::RpcError(_) => true,
            ArbError::OracleError(_) => true, // Oracle may answer next cycle
            ArbError::TimeoutError(_) => true,
            ArbError::ValidationError(_) => false, // The opportunity is gone, not the service
            ArbError::InstructionError(_) => false,
            ArbError::SimulationFailed(_) => false, // Same instruction set would fail again
            ArbError::TransactionError(_) => true,
            ArbError::ConfirmationTimeout(_) => true, // A fresh, independent attempt may land
            ArbError::ExecutionError(msg) => msg.contains("temporary") || msg.contains("retry"),
            ArbError::ParseError(_) => false,
            ArbError::ConfigError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_failures_are_not_retried() {
        assert!(!ArbError::SimulationFailed("custom program error".into()).is_recoverable());
    }

    #[test]
    fn network_and_confirmation_errors_are_recoverable() {
        assert!(ArbError::NetworkError("connection reset".into()).is_recoverable());
        assert!(ArbError::ConfirmationTimeout("sig abc".into()).is_recoverable());
    }
}
