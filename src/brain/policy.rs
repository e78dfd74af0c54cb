//! Policy updater - nudges weights from feedback
//!
//! Reward is the feedback score mapped onto [-1, 1] and biased by the final
//! outcome. Every token of the candidate moves by
//!
//! ```text
//! new = w + learning_rate * reward * (1 - decay_factor * w / max)
//! ```
//!
//! and is then clamped. Unseen tokens are discovered at the baseline first.
//! With probability ε one token also receives a bounded random jitter; that
//! is the only nondeterminism in the engine.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::normalizer::normalize_set;
use super::state::BrainState;
use crate::config::LearningConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{Decision, FeedbackEvent, Outcome, SkillToken};

/// What one feedback event did to the weight store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub event_key: String,
    pub candidate_id: String,
    pub reward: f64,
    pub updated_tokens: BTreeSet<SkillToken>,
    /// Stored weight minus previous weight, per token
    pub deltas: BTreeMap<SkillToken, f64>,
    /// Tokens first seen in this event
    pub discovered: BTreeSet<SkillToken>,
    /// Token that received exploration jitter, if any
    pub explored: Option<SkillToken>,
    pub applied_at: DateTime<Utc>,
}

/// Single-writer policy update logic
#[derive(Debug)]
pub struct PolicyUpdater {
    config: LearningConfig,
    rng: StdRng,
}

impl PolicyUpdater {
    pub fn new(config: LearningConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Map a score and outcome onto a reward in [-1, 1]
    pub fn reward(&self, feedback_score: f64, outcome: Outcome) -> f64 {
        let base = ((feedback_score - 3.0) / 2.0).clamp(-1.0, 1.0);
        let c = &self.config;
        let reward = match outcome {
            Outcome::Hired => c.score_share * base + c.outcome_share,
            Outcome::Rejected => c.score_share * base - c.outcome_share,
            Outcome::Reconsider => c.reconsider_damping * c.score_share * base,
        };
        reward.clamp(-1.0, 1.0)
    }

    /// Tokens the event applies to: its own skills, else the prior decision's
    pub fn tokens_for(event: &FeedbackEvent, prior: Option<&Decision>) -> BTreeSet<SkillToken> {
        let own = normalize_set(&event.skills);
        if !own.is_empty() {
            return own;
        }
        prior.map(|d| d.matched_tokens.clone()).unwrap_or_default()
    }

    /// Apply one feedback event to `state`.
    ///
    /// Validation and range failures leave `state` untouched. A replayed event
    /// returns [`EngineError::DuplicateEvent`] carrying the original report.
    pub fn apply(
        &mut self,
        event: &FeedbackEvent,
        prior: Option<&Decision>,
        state: &mut BrainState,
    ) -> EngineResult<UpdateReport> {
        event.validate()?;
        if let Some(decision) = prior {
            if decision.candidate_id != event.candidate_id {
                return Err(EngineError::validation(format!(
                    "decision {} belongs to candidate {}, not {}",
                    decision.id, decision.candidate_id, event.candidate_id
                )));
            }
        }

        let key = event.key();
        if let Some(previous) = state.applied.get(&key) {
            debug!("Skipping replayed feedback event {}", key);
            return Err(EngineError::DuplicateEvent {
                key,
                prior: Box::new(previous.clone()),
            });
        }

        let tokens = Self::tokens_for(event, prior);
        let reward = self.reward(event.feedback_score, event.outcome);
        let bounds = state.weights.bounds();
        let lr = state.learning_rate;
        let decay = state.decay_factor;

        // Plan every new weight before touching the store
        let mut plan: Vec<(SkillToken, f64, f64)> = tokens
            .iter()
            .map(|t| {
                let current = state.weights.get_or_default(t);
                let proposed = current + lr * reward * (1.0 - decay * current / bounds.max);
                (t.clone(), current, proposed)
            })
            .collect();

        let mut explored = None;
        let eps = self.config.exploration_rate;
        let jitter = self.config.exploration_jitter;
        if eps > 0.0 && jitter > 0.0 && !plan.is_empty() && self.rng.random::<f64>() < eps {
            let idx = self.rng.random_range(0..plan.len());
            let nudge = self.rng.random_range(-jitter..=jitter);
            plan[idx].2 += nudge;
            debug!("Exploration jitter {:+.4} on '{}'", nudge, plan[idx].0);
            explored = Some(plan[idx].0.clone());
        }

        let mut checked = Vec::with_capacity(plan.len());
        for (token, current, proposed) in plan {
            let new_weight = bounds.enforce(&token, proposed)?;
            checked.push((token, current, new_weight));
        }

        let mut deltas = BTreeMap::new();
        let mut discovered = BTreeSet::new();
        for (token, current, new_weight) in checked {
            if state.weights.discover(&token) {
                discovered.insert(token.clone());
            }
            let stored = state.weights.upsert(&token, new_weight)?;
            debug!("Weight '{}' {:.4} -> {:.4}", token, current, stored);
            deltas.insert(token, stored - current);
        }

        if !discovered.is_empty() {
            info!(
                "Discovered {} new skill token(s): {}",
                discovered.len(),
                discovered.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
        info!(
            "Policy updated for candidate {}: reward {:.3}, {} token(s), {} tracked",
            event.candidate_id,
            reward,
            tokens.len(),
            state.weights.len()
        );

        let report = UpdateReport {
            event_key: key.clone(),
            candidate_id: event.candidate_id.clone(),
            reward,
            updated_tokens: tokens,
            deltas,
            discovered,
            explored,
            applied_at: Utc::now(),
        };
        state.applied.insert(key, report.clone());
        Ok(report)
    }
}

impl Default for PolicyUpdater {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::normalizer::normalize;
    use crate::brain::weights::{WeightBounds, WeightStore};

    fn updater() -> PolicyUpdater {
        PolicyUpdater::new(LearningConfig::default().deterministic())
    }

    fn state() -> BrainState {
        BrainState::new(WeightStore::default(), 0.15, 0.5)
    }

    fn event(skills: &[&str], score: f64, outcome: Outcome) -> FeedbackEvent {
        FeedbackEvent {
            candidate_id: "c-1".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            feedback_score: score,
            outcome,
            timestamp: Utc::now(),
            correlated_decision: None,
        }
    }

    #[test]
    fn test_reward_mapping() {
        let u = updater();
        assert!((u.reward(5.0, Outcome::Hired) - 1.0).abs() < 1e-12);
        assert!((u.reward(1.0, Outcome::Rejected) + 1.0).abs() < 1e-12);
        assert_eq!(u.reward(3.0, Outcome::Reconsider), 0.0);
        // High score, rejected: still negative
        assert!(u.reward(5.0, Outcome::Rejected) < 0.0);
        // Reconsider stays close to zero
        assert!(u.reward(5.0, Outcome::Reconsider).abs() <= 0.1 + 1e-12);
        // Monotone in score for a fixed outcome
        for outcome in [Outcome::Hired, Outcome::Rejected, Outcome::Reconsider] {
            assert!(u.reward(4.0, outcome) >= u.reward(2.0, outcome));
        }
    }

    #[test]
    fn test_positive_feedback_increases_weight() {
        let mut u = updater();
        let mut s = state();
        let report = u.apply(&event(&["python"], 5.0, Outcome::Hired), None, &mut s).unwrap();

        let python = normalize("python");
        let weight = s.weights.get(&python).unwrap().weight;
        assert!(weight > 0.5);
        // 0.5 + 0.15 * 1.0 * (1 - 0.5 * 0.5 / 3.0)
        assert!((weight - 0.6375).abs() < 1e-12);
        assert!((report.deltas[&python] - 0.1375).abs() < 1e-12);
        assert!(report.discovered.contains(&python));
    }

    #[test]
    fn test_negative_feedback_decreases_weight() {
        let mut u = updater();
        let mut s = state();
        u.apply(&event(&["python"], 5.0, Outcome::Hired), None, &mut s).unwrap();
        let before = s.weights.get_or_default(&normalize("python"));

        u.apply(&event(&["python"], 1.0, Outcome::Rejected), None, &mut s).unwrap();
        let after = s.weights.get_or_default(&normalize("python"));
        assert!(after < before);
    }

    #[test]
    fn test_invalid_score_does_not_mutate() {
        let mut u = updater();
        let mut s = state();
        let before = s.clone();

        let err = u.apply(&event(&["python"], 6.0, Outcome::Hired), None, &mut s).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(s, before);
    }

    #[test]
    fn test_replay_returns_prior_report() {
        let mut u = updater();
        let mut s = state();
        let e = event(&["python", "sql"], 4.0, Outcome::Hired);

        let first = u.apply(&e, None, &mut s).unwrap();
        let snapshot = s.weights.snapshot();

        match u.apply(&e, None, &mut s) {
            Err(EngineError::DuplicateEvent { prior, .. }) => assert_eq!(*prior, first),
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(s.weights.snapshot(), snapshot);
    }

    #[test]
    fn test_weights_stay_bounded() {
        let mut u = PolicyUpdater::new(LearningConfig {
            learning_rate: 2.0,
            exploration_rate: 1.0,
            exploration_jitter: 0.5,
            seed: Some(7),
            ..LearningConfig::default()
        });
        let mut s = BrainState::new(WeightStore::default(), 2.0, 0.0);

        for i in 0..200 {
            let (score, outcome) = if i % 3 == 0 { (1.0, Outcome::Rejected) } else { (5.0, Outcome::Hired) };
            let mut e = event(&["python", "go", "rust"], score, outcome);
            e.timestamp = e.timestamp + chrono::Duration::milliseconds(i);
            u.apply(&e, None, &mut s).unwrap();
            for entry in s.weights.iter() {
                assert!(entry.weight >= 0.05 && entry.weight <= 3.0, "{:?}", entry);
            }
        }
    }

    #[test]
    fn test_out_of_range_without_clamp_is_atomic() {
        let bounds = WeightBounds { clamp: false, ..WeightBounds::default() };
        let mut s = BrainState::new(WeightStore::new(bounds), 0.15, 0.5);
        s.weights.upsert(&normalize("python"), 3.0).unwrap();
        let before = s.clone();

        let mut u = updater();
        let err = u
            .apply(&event(&["python", "go"], 5.0, Outcome::Hired), None, &mut s)
            .unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange { .. }));
        assert_eq!(s, before);
        assert!(!s.weights.contains(&normalize("go")));
    }

    #[test]
    fn test_falls_back_to_prior_decision_tokens() {
        let scorer = crate::brain::scorer::Scorer::default();
        let mut s = state();
        let candidate = crate::types::Candidate::new("c-1", vec!["Kotlin".to_string()]);
        let decision = scorer.decide(&candidate, &s.weights);

        let mut u = updater();
        let report = u.apply(&event(&[], 5.0, Outcome::Hired), Some(&decision), &mut s).unwrap();
        assert!(report.updated_tokens.contains(&normalize("kotlin")));
    }

    #[test]
    fn test_prior_decision_for_other_candidate_is_rejected() {
        let scorer = crate::brain::scorer::Scorer::default();
        let mut s = state();
        let other = crate::types::Candidate::new("c-2", vec!["Kotlin".to_string()]);
        let decision = scorer.decide(&other, &s.weights);

        let mut u = updater();
        let err = u.apply(&event(&[], 5.0, Outcome::Hired), Some(&decision), &mut s).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_exploration_disabled_is_deterministic() {
        let e = event(&["python", "go"], 4.0, Outcome::Hired);
        let mut a = state();
        let mut b = state();
        let ra = updater().apply(&e, None, &mut a).unwrap();
        let rb = updater().apply(&e, None, &mut b).unwrap();
        assert_eq!(ra.deltas, rb.deltas);
        assert!(ra.explored.is_none());
    }

    #[test]
    fn test_exploration_jitter_is_bounded() {
        let mut u = PolicyUpdater::new(LearningConfig {
            exploration_rate: 1.0,
            exploration_jitter: 0.05,
            seed: Some(11),
            ..LearningConfig::default()
        });
        let mut s = state();
        let report = u.apply(&event(&["python"], 3.0, Outcome::Reconsider), None, &mut s).unwrap();

        let python = normalize("python");
        assert_eq!(report.explored.as_ref(), Some(&python));
        // Reward is zero, so the whole delta is jitter
        assert!(report.deltas[&python].abs() <= 0.05 + 1e-12);
    }
}
