//! Scorer - turns a candidate's skills into a decision
//!
//! Read-only against the weight store. The raw score is the mean weight of
//! the candidate's tokens, mapped through a sigmoid centred on the baseline
//! weight so an all-baseline candidate lands at 0.5.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

use super::normalizer::normalize_set;
use super::weights::WeightStore;
use crate::config::ScoringConfig;
use crate::types::{Candidate, ContributingFactor, Decision, Recommendation, SkillToken};

/// Number of contributing factors reported per decision
const MAX_FACTORS: usize = 3;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Decision function over a weight store
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Mean weight of `tokens`; 0 for an empty set
    pub fn raw_score(&self, tokens: &BTreeSet<SkillToken>, store: &WeightStore) -> f64 {
        let total: f64 = tokens.iter().map(|t| store.get_or_default(t)).sum();
        total / tokens.len().max(1) as f64
    }

    /// Success probability for a token set against the given store
    pub fn probability_for(&self, tokens: &BTreeSet<SkillToken>, store: &WeightStore) -> f64 {
        let midpoint = store.bounds().baseline;
        let s = self.raw_score(tokens, store);
        sigmoid(self.config.steepness * (s - midpoint)).clamp(0.0, 1.0)
    }

    pub fn confidence_for(&self, tokens: &BTreeSet<SkillToken>) -> f64 {
        (tokens.len() as f64 / self.config.reference_skill_count.max(1) as f64).min(1.0)
    }

    pub fn recommend(&self, probability: f64) -> Recommendation {
        if probability >= self.config.hire_threshold {
            Recommendation::RecommendHire
        } else if probability <= self.config.reject_threshold {
            Recommendation::Reject
        } else {
            Recommendation::Consider
        }
    }

    /// Score a candidate. Never fails and never mutates the store.
    pub fn decide(&self, candidate: &Candidate, store: &WeightStore) -> Decision {
        let matched_tokens = normalize_set(&candidate.skills);
        let raw_score = self.raw_score(&matched_tokens, store);
        let success_probability = self.probability_for(&matched_tokens, store);
        let confidence = self.confidence_for(&matched_tokens);
        let recommendation = self.recommend(success_probability);

        let mut contributing_factors: Vec<ContributingFactor> = matched_tokens
            .iter()
            .map(|t| ContributingFactor {
                token: t.clone(),
                weight: store.get_or_default(t),
                known: store.contains(t),
            })
            .collect();
        contributing_factors.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.token.cmp(&b.token))
        });
        contributing_factors.truncate(MAX_FACTORS);

        debug!(
            "Scored candidate {}: {} tokens, S={:.3}, p={:.3}, confidence={:.2}, {}",
            candidate.id,
            matched_tokens.len(),
            raw_score,
            success_probability,
            confidence,
            recommendation
        );

        Decision {
            id: Uuid::new_v4(),
            candidate_id: candidate.id.clone(),
            matched_tokens,
            raw_score,
            success_probability,
            confidence,
            recommendation,
            contributing_factors,
            timestamp: Utc::now(),
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::normalizer::normalize;

    fn candidate(skills: &[&str]) -> Candidate {
        Candidate::new("c-1", skills.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_baseline_candidate_scores_half() {
        let scorer = Scorer::default();
        let store = WeightStore::default();

        let decision = scorer.decide(&candidate(&["python", "ai"]), &store);
        assert_eq!(decision.matched_tokens.len(), 2);
        assert!((decision.raw_score - 0.5).abs() < 1e-12);
        assert!((decision.success_probability - 0.5).abs() < 1e-9);
        assert!((decision.confidence - 0.4).abs() < 1e-12);
        assert_eq!(decision.recommendation, Recommendation::Consider);
        assert!(decision.contributing_factors.iter().all(|f| !f.known));
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_skills() {
        let scorer = Scorer::default();
        let store = WeightStore::default();

        let decision = scorer.decide(&candidate(&[]), &store);
        assert_eq!(decision.raw_score, 0.0);
        assert_eq!(decision.confidence, 0.0);
        assert!((decision.success_probability - sigmoid(-6.0 * 0.5)).abs() < 1e-12);
        assert_eq!(decision.recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_malformed_skills_degrade_to_zero_confidence() {
        let scorer = Scorer::default();
        let decision = scorer.decide(&candidate(&["!!!", "   ", "@@"]), &WeightStore::default());
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.matched_tokens.is_empty());
    }

    #[test]
    fn test_strong_weights_recommend_hire() {
        let scorer = Scorer::default();
        let mut store = WeightStore::default();
        store.upsert(&normalize("rust"), 1.5).unwrap();
        store.upsert(&normalize("sql"), 1.2).unwrap();

        let decision = scorer.decide(&candidate(&["Rust", "SQL"]), &store);
        assert_eq!(decision.recommendation, Recommendation::RecommendHire);
        assert_eq!(decision.contributing_factors[0].token.as_str(), "rust");
        assert!(decision.contributing_factors[0].known);
    }

    #[test]
    fn test_weak_weights_reject() {
        let scorer = Scorer::default();
        let mut store = WeightStore::default();
        store.upsert(&normalize("cobol"), 0.1).unwrap();

        let decision = scorer.decide(&candidate(&["COBOL"]), &store);
        assert_eq!(decision.recommendation, Recommendation::Reject);
    }

    #[test]
    fn test_confidence_saturates() {
        let scorer = Scorer::default();
        let skills = ["a1", "b2", "c3", "d4", "e5", "f6", "g7"];
        let decision = scorer.decide(&candidate(&skills), &WeightStore::default());
        assert_eq!(decision.confidence, 1.0);
        assert_eq!(decision.contributing_factors.len(), MAX_FACTORS);
    }

    #[test]
    fn test_decide_is_deterministic() {
        let scorer = Scorer::default();
        let mut store = WeightStore::default();
        store.upsert(&normalize("python"), 0.9).unwrap();
        let c = candidate(&["Python", "Go", "Docker"]);

        let a = scorer.decide(&c, &store);
        let b = scorer.decide(&c, &store);
        assert_eq!(a.matched_tokens, b.matched_tokens);
        assert_eq!(a.success_probability, b.success_probability);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.recommendation, b.recommendation);
        assert_eq!(a.contributing_factors, b.contributing_factors);
    }

    #[test]
    fn test_probability_bounds_extremes() {
        let scorer = Scorer::new(ScoringConfig { steepness: 1e6, ..ScoringConfig::default() });
        let mut store = WeightStore::default();
        store.upsert(&normalize("x"), 3.0).unwrap();
        store.upsert(&normalize("y"), 0.05).unwrap();

        for skills in [vec!["x"], vec!["y"], vec![]] {
            let d = scorer.decide(&candidate(&skills), &store);
            assert!((0.0..=1.0).contains(&d.success_probability));
            assert!((0.0..=1.0).contains(&d.confidence));
        }
    }
}
