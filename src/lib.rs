//! hire-brain - Adaptive Candidate Scoring Library
//!
//! Scores candidates from their skills and learns from hiring feedback:
//! - Skill normalization with a fixed synonym table
//! - Bounded, persistent skill weights with discovery of new skills
//! - Sigmoid success probability, confidence and a recommendation
//! - Reward-driven weight updates with optional exploration jitter
//! - Append-only analytics with reward, success-rate and velocity views
//!
//! # Example
//!
//! ```ignore
//! use hire_brain::{Candidate, Config, FeedbackRequest, HiringEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = HiringEngine::in_memory(Config::default());
//!     let candidate = Candidate::new("c-42", vec!["Python".into(), "ML".into()]);
//!     let decision = engine.decide(&candidate).await;
//!     println!("{} ({:.2})", decision.recommendation, decision.success_probability);
//!
//!     engine.submit(FeedbackRequest {
//!         candidate_id: "c-42".into(),
//!         skills: vec![],
//!         feedback_score: 5.0,
//!         outcome: "hired".into(),
//!         timestamp: None,
//!         correlated_decision: Some(decision.id),
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod brain;
pub mod analytics;
pub mod engine;
pub mod cli;

pub use types::{
    Candidate,
    ContributingFactor,
    Decision,
    FeedbackEvent,
    FeedbackRequest,
    Outcome,
    Recommendation,
    SkillToken,
};

pub use error::{EngineError, EngineResult};

pub use config::Config;

pub use brain::{
    normalize,
    normalize_set,
    BrainState,
    FileStateSink,
    StateSink,
    UpdateReport,
    WeightEntry,
    WeightStore,
};

pub use analytics::{AnalyticsLog, AnalyticsReport, BrainSummary};

pub use engine::{Durability, FeedbackReceipt, HiringEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Adaptive Candidate Scoring Library", NAME, VERSION)
}
