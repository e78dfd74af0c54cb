//! Engine error taxonomy
//!
//! Every failure the engine can report to a caller. Scoring never produces one
//! of these; feedback and persistence do.

use thiserror::Error;

use crate::brain::policy::UpdateReport;

/// Errors returned by the scoring engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input (score outside [1,5], unknown outcome, mismatched decision, bad state file)
    #[error("validation failed: {0}")]
    Validation(String),

    /// A computed weight left [min, max] while clamping is disabled
    #[error("weight {weight} for '{token}' is outside [{min}, {max}]")]
    OutOfRange {
        token: String,
        weight: f64,
        min: f64,
        max: f64,
    },

    /// State could not be flushed after the configured number of attempts
    #[error("persistence failed after {attempts} attempt(s): {reason}")]
    Persistence { attempts: u32, reason: String },

    /// The event was already applied; carries the original result
    #[error("feedback event '{key}' was already applied")]
    DuplicateEvent {
        key: String,
        prior: Box<UpdateReport>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Whether the error was raised before any state was touched
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::OutOfRange { .. } | EngineError::DuplicateEvent { .. }
        )
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
