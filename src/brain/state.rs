//! Brain state - the weight store plus learning parameters
//!
//! Owned by the engine and mutated only through the policy updater. The
//! serialized form is what lands on disk; `load(dump(s)) == s` holds for any
//! reachable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::policy::UpdateReport;
use super::weights::{WeightBounds, WeightEntry, WeightStore};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct BrainState {
    pub weights: WeightStore,
    pub learning_rate: f64,
    pub decay_factor: f64,
    /// Applied feedback events by idempotence key. Grows by one report per
    /// applied event for the life of the state file, and every flush
    /// rewrites it in full.
    pub applied: BTreeMap<String, UpdateReport>,
    pub last_flush: Option<DateTime<Utc>>,
}

/// Durable record of a [`BrainState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub weights: Vec<WeightEntry>,
    pub learning_rate: f64,
    pub decay_factor: f64,
    pub last_flush_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applied_events: BTreeMap<String, UpdateReport>,
}

impl BrainState {
    pub fn new(weights: WeightStore, learning_rate: f64, decay_factor: f64) -> Self {
        Self {
            weights,
            learning_rate,
            decay_factor,
            applied: BTreeMap::new(),
            last_flush: None,
        }
    }

    /// Fresh state from configuration defaults
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            WeightStore::new(config.weights.clone().into()),
            config.learning.learning_rate,
            config.learning.decay_factor,
        )
    }

    pub fn to_record(&self) -> PersistedState {
        PersistedState {
            version: STATE_VERSION,
            weights: self.weights.snapshot(),
            learning_rate: self.learning_rate,
            decay_factor: self.decay_factor,
            last_flush_timestamp: self.last_flush,
            applied_events: self.applied.clone(),
        }
    }

    pub fn from_record(record: PersistedState, bounds: WeightBounds) -> EngineResult<Self> {
        if record.version > STATE_VERSION {
            return Err(EngineError::validation(format!(
                "state file version {} is newer than supported version {}",
                record.version, STATE_VERSION
            )));
        }
        Ok(Self {
            weights: WeightStore::from_entries(record.weights, bounds)?,
            learning_rate: record.learning_rate,
            decay_factor: record.decay_factor,
            applied: record.applied_events,
            last_flush: record.last_flush_timestamp,
        })
    }

    /// Compact JSON; the file is rewritten on every update
    pub fn dump(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn load(serialized: &str, bounds: WeightBounds) -> EngineResult<Self> {
        let record: PersistedState = serde_json::from_str(serialized)?;
        Self::from_record(record, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::policy::PolicyUpdater;
    use crate::config::LearningConfig;
    use crate::types::{FeedbackEvent, Outcome};

    #[test]
    fn test_empty_state_roundtrip() {
        let state = BrainState::from_config(&Config::default());
        let loaded = BrainState::load(&state.dump().unwrap(), state.weights.bounds()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_reachable_state_roundtrip() {
        let mut state = BrainState::from_config(&Config::default());
        let mut updater = PolicyUpdater::new(LearningConfig {
            exploration_rate: 0.5,
            seed: Some(3),
            ..LearningConfig::default()
        });

        let skills = [vec!["Python", "ML"], vec!["Rust"], vec!["SQL", "python", "Go"]];
        for (i, set) in skills.iter().enumerate() {
            let event = FeedbackEvent {
                candidate_id: format!("c-{}", i),
                skills: set.iter().map(|s| s.to_string()).collect(),
                feedback_score: 1.0 + i as f64 * 1.7,
                outcome: if i % 2 == 0 { Outcome::Hired } else { Outcome::Rejected },
                timestamp: Utc::now(),
                correlated_decision: None,
            };
            updater.apply(&event, None, &mut state).unwrap();
        }
        state.last_flush = Some(Utc::now());

        let dumped = state.dump().unwrap();
        let loaded = BrainState::load(&dumped, state.weights.bounds()).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.dump().unwrap(), dumped);
    }

    #[test]
    fn test_dump_is_compact() {
        let mut state = BrainState::from_config(&Config::default());
        let mut updater = PolicyUpdater::new(LearningConfig::default().deterministic());
        let event = FeedbackEvent {
            candidate_id: "c-1".into(),
            skills: vec!["Python".into(), "SQL".into()],
            feedback_score: 4.0,
            outcome: Outcome::Hired,
            timestamp: Utc::now(),
            correlated_decision: None,
        };
        updater.apply(&event, None, &mut state).unwrap();

        let dumped = state.dump().unwrap();
        assert!(!dumped.contains('\n'));
        assert_eq!(state.applied.len(), 1);
    }

    #[test]
    fn test_load_enforces_current_bounds() {
        let mut state = BrainState::from_config(&Config::default());
        state.weights.upsert(&crate::brain::normalizer::normalize("python"), 3.0).unwrap();
        let dumped = state.dump().unwrap();

        let narrow = WeightBounds { max: 1.0, ..WeightBounds::default() };
        let loaded = BrainState::load(&dumped, narrow).unwrap();
        for entry in loaded.weights.iter() {
            assert!(entry.weight >= narrow.min && entry.weight <= narrow.max, "{:?}", entry);
        }

        let strict = WeightBounds { clamp: false, ..narrow };
        assert!(matches!(
            BrainState::load(&dumped, strict),
            Err(EngineError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut record = BrainState::from_config(&Config::default()).to_record();
        record.version = STATE_VERSION + 1;
        let text = serde_json::to_string(&record).unwrap();
        assert!(BrainState::load(&text, WeightBounds::default()).is_err());
    }
}
