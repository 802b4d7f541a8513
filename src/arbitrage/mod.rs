//! Detection, scoring, and orchestration of flash-loan opportunities.

pub mod detector;
pub mod opportunity;
pub mod orchestrator;
pub mod scoring;

pub use detector::{DetectorConfig, OpportunityDetector};
pub use opportunity::{
    ExecutedOpportunity, OpportunityKey, OpportunityKind, RawOpportunity, ScoredOpportunity,
};
pub use orchestrator::{Orchestrator, OrchestratorStatus};
pub use scoring::{combined_score, ScoringEngine};
