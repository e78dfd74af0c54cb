//! Shared types used across modules
//!
//! Candidates and feedback come in from collaborators; decisions go out.
//! Kept here so the brain and analytics modules can both use them without
//! depending on each other.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Canonical form of a raw skill string. Produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillToken(String);

impl SkillToken {
    pub(crate) fn from_normalized(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SkillToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SkillToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A candidate record as supplied by the HR platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub skills: Vec<String>,
    /// Everything else (name, email, phone...) passes through untouched
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, skills: Vec<String>) -> Self {
        Self {
            id: id.into(),
            skills,
            attributes: serde_json::Map::new(),
        }
    }
}

/// What the engine suggests doing with a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    RecommendHire,
    Consider,
    Reject,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::RecommendHire => write!(f, "recommend_hire"),
            Recommendation::Consider => write!(f, "consider"),
            Recommendation::Reject => write!(f, "reject"),
        }
    }
}

/// One of the top-weighted skills behind a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub token: SkillToken,
    pub weight: f64,
    /// False when the token has never received feedback and scored at baseline
    pub known: bool,
}

/// The scored output for one candidate at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub candidate_id: String,
    pub matched_tokens: BTreeSet<SkillToken>,
    /// Mean weight of the matched tokens
    pub raw_score: f64,
    pub success_probability: f64,
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub contributing_factors: Vec<ContributingFactor>,
    pub timestamp: DateTime<Utc>,
}

/// Final outcome reported alongside a feedback score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[serde(alias = "offer_accepted", alias = "accept")]
    Hired,
    #[serde(alias = "declined", alias = "reject")]
    Rejected,
    #[serde(alias = "maybe", alias = "pending")]
    Reconsider,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Hired => write!(f, "hired"),
            Outcome::Rejected => write!(f, "rejected"),
            Outcome::Reconsider => write!(f, "reconsider"),
        }
    }
}

impl FromStr for Outcome {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "hired" | "offer_accepted" | "accept" => Ok(Outcome::Hired),
            "rejected" | "declined" | "reject" => Ok(Outcome::Rejected),
            "reconsider" | "maybe" | "pending" => Ok(Outcome::Reconsider),
            other => Err(EngineError::validation(format!("unrecognized outcome '{}'", other))),
        }
    }
}

/// A validated feedback event, consumed once by the policy updater
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub candidate_id: String,
    /// Raw skills of the candidate; falls back to the correlated decision when empty
    #[serde(default)]
    pub skills: Vec<String>,
    pub feedback_score: f64,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub correlated_decision: Option<Uuid>,
}

impl FeedbackEvent {
    /// Idempotence key: identical tuples are the same event
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.candidate_id,
            self.feedback_score,
            self.outcome,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
        )
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.feedback_score.is_finite() || !(1.0..=5.0).contains(&self.feedback_score) {
            return Err(EngineError::validation(format!(
                "feedback_score {} outside [1, 5]",
                self.feedback_score
            )));
        }
        if self.candidate_id.trim().is_empty() {
            return Err(EngineError::validation("candidate_id is empty"));
        }
        Ok(())
    }
}

/// Feedback as submitted by a collaborator, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub candidate_id: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub feedback_score: f64,
    pub outcome: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correlated_decision: Option<Uuid>,
}

impl FeedbackRequest {
    /// Validate at the boundary and produce an event. Missing timestamps become now.
    pub fn into_event(self) -> EngineResult<FeedbackEvent> {
        let outcome: Outcome = self.outcome.parse()?;
        let event = FeedbackEvent {
            candidate_id: self.candidate_id,
            skills: self.skills,
            feedback_score: self.feedback_score,
            outcome,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            correlated_decision: self.correlated_decision,
        };
        event.validate()?;
        Ok(event)
    }
}
