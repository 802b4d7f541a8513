//! Transaction layer: fee policy and estimation, program instruction
//! building, and the send/confirm/retry manager.

pub mod fees;
pub mod instructions;
pub mod manager;

pub use fees::{FeeEstimator, FeePolicy, InstructionKind, TransactionCostEstimate};
pub use instructions::RouteHop;
pub use manager::{TransactionManager, TransactionRecord, TxManagerSettings, TxStatus};
