//! Derived views over the analytics log and weight store
//!
//! Everything here is read-only and recomputed on demand.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::log::AnalyticsLog;
use crate::brain::weights::{WeightEntry, WeightStore};
use crate::config::AnalyticsConfig;
use crate::types::{Outcome, Recommendation};

/// Rewards shown in the reward evolution series
const REWARD_HISTORY_LEN: usize = 20;
/// Rewards compared on each side of the learning trend
const TREND_WINDOW: usize = 5;
/// Tokens listed at the bottom of the brain summary
const BOTTOM_N: usize = 5;
/// Tokens considered for insights
const INSIGHT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardPoint {
    pub timestamp: DateTime<Utc>,
    pub reward: f64,
    pub cumulative: f64,
}

/// Running total of reward over time, in log order
pub fn cumulative_reward(log: &AnalyticsLog) -> Vec<RewardPoint> {
    let mut total = 0.0;
    log.feedback()
        .map(|f| {
            total += f.report.reward;
            RewardPoint {
                timestamp: f.report.applied_at,
                reward: f.report.reward,
                cumulative: total,
            }
        })
        .collect()
}

/// Fraction of `hired` among the last `window` feedback events; 0 with no feedback
pub fn rolling_success_rate(log: &AnalyticsLog, window: usize) -> f64 {
    let outcomes: Vec<Outcome> = log.feedback().map(|f| f.event.outcome).collect();
    let recent = &outcomes[outcomes.len().saturating_sub(window.max(1))..];
    if recent.is_empty() {
        return 0.0;
    }
    let hired = recent.iter().filter(|o| **o == Outcome::Hired).count();
    hired as f64 / recent.len() as f64
}

pub fn top_tokens(store: &WeightStore, n: usize) -> Vec<WeightEntry> {
    store.top(n)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateVelocity {
    pub window_minutes: i64,
    /// Feedback events applied in the window
    pub events: usize,
    /// Individual weight updates in the window
    pub token_updates: usize,
    pub events_per_hour: f64,
    pub token_updates_per_hour: f64,
}

/// Updates per hour over the trailing `window` ending at `now`
pub fn update_velocity(log: &AnalyticsLog, window: Duration, now: DateTime<Utc>) -> UpdateVelocity {
    let since = now - window;
    let mut events = 0;
    let mut token_updates = 0;
    for record in log.feedback() {
        let at = record.report.applied_at;
        if at >= since && at <= now {
            events += 1;
            token_updates += record.report.updated_tokens.len();
        }
    }

    let hours = window.num_milliseconds() as f64 / 3_600_000.0;
    let per_hour = |count: usize| if hours > 0.0 { count as f64 / hours } else { 0.0 };

    UpdateVelocity {
        window_minutes: window.num_minutes(),
        events,
        token_updates,
        events_per_hour: per_hour(events),
        token_updates_per_hour: per_hour(token_updates),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningTrend {
    Improving,
    Stable,
}

/// "Improving" when the last five rewards outweigh the five before them
pub fn learning_trend(rewards: &[f64]) -> LearningTrend {
    if rewards.len() <= TREND_WINDOW {
        return LearningTrend::Stable;
    }
    let split = rewards.len() - TREND_WINDOW;
    let recent: f64 = rewards[split..].iter().sum();
    let previous: f64 = rewards[split.saturating_sub(TREND_WINDOW)..split].iter().sum();
    if recent > previous {
        LearningTrend::Improving
    } else {
        LearningTrend::Stable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardSummary {
    pub total: f64,
    pub average: f64,
    pub count: usize,
    /// Most recent rewards, oldest first
    pub recent: Vec<f64>,
    pub trend: LearningTrend,
}

pub fn reward_summary(log: &AnalyticsLog) -> RewardSummary {
    let rewards: Vec<f64> = log.feedback().map(|f| f.report.reward).collect();
    let total: f64 = rewards.iter().sum();
    let average = if rewards.is_empty() { 0.0 } else { total / rewards.len() as f64 };
    RewardSummary {
        total,
        average,
        count: rewards.len(),
        recent: rewards[rewards.len().saturating_sub(REWARD_HISTORY_LEN)..].to_vec(),
        trend: learning_trend(&rewards),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub hired: usize,
    pub rejected: usize,
    pub reconsider: usize,
}

pub fn outcome_counts(log: &AnalyticsLog) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();
    for record in log.feedback() {
        match record.event.outcome {
            Outcome::Hired => counts.hired += 1,
            Outcome::Rejected => counts.rejected += 1,
            Outcome::Reconsider => counts.reconsider += 1,
        }
    }
    counts
}

pub fn recommendation_counts(log: &AnalyticsLog) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for rec in [Recommendation::RecommendHire, Recommendation::Consider, Recommendation::Reject] {
        counts.insert(rec.to_string(), 0);
    }
    for decision in log.decisions() {
        *counts.entry(decision.recommendation.to_string()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillDistribution {
    /// Weight above 1.5x baseline
    pub strong: usize,
    /// Above baseline, up to 1.5x
    pub moderate: usize,
    /// At or below baseline
    pub weak: usize,
}

pub fn skill_distribution(store: &WeightStore) -> SkillDistribution {
    let baseline = store.bounds().baseline;
    let mut dist = SkillDistribution::default();
    for entry in store.iter() {
        if entry.weight > baseline * 1.5 {
            dist.strong += 1;
        } else if entry.weight > baseline {
            dist.moderate += 1;
        } else {
            dist.weak += 1;
        }
    }
    dist
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainSummary {
    pub total_tokens: usize,
    pub average_weight: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    /// Tokens learned above baseline
    pub active_tokens: usize,
    pub passive_tokens: usize,
    pub top: Vec<WeightEntry>,
    pub bottom: Vec<WeightEntry>,
    pub distribution: SkillDistribution,
}

pub fn brain_summary(store: &WeightStore, top_n: usize) -> BrainSummary {
    let baseline = store.bounds().baseline;
    let weights: Vec<f64> = store.iter().map(|e| e.weight).collect();
    let (average_weight, min_weight, max_weight) = if weights.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            weights.iter().sum::<f64>() / weights.len() as f64,
            weights.iter().copied().fold(f64::INFINITY, f64::min),
            weights.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    };
    let active_tokens = weights.iter().filter(|w| **w > baseline).count();

    let ranked = store.ranked();
    let bottom = ranked.iter().rev().take(BOTTOM_N).map(|e| (*e).clone()).collect();

    BrainSummary {
        total_tokens: weights.len(),
        average_weight,
        min_weight,
        max_weight,
        active_tokens,
        passive_tokens: weights.len() - active_tokens,
        top: store.top(top_n),
        bottom,
        distribution: skill_distribution(store),
    }
}

/// Human-readable observations about what the brain has learned
pub fn insights(store: &WeightStore, log: &AnalyticsLog) -> Vec<String> {
    let baseline = store.bounds().baseline;
    let mut out = Vec::new();

    for entry in store.top(INSIGHT_TOP_N) {
        if entry.weight > baseline * 1.2 {
            out.push(format!("Strong match for {} (weight: {:.2})", entry.token, entry.weight));
        } else if entry.weight > baseline {
            out.push(format!("Good potential in {} (weight: {:.2})", entry.token, entry.weight));
        }
    }

    if store.len() > 10 {
        out.push(format!("Brain has learned from {} skills", store.len()));
    }

    let rewards: Vec<f64> = log.feedback().map(|f| f.report.reward).collect();
    if learning_trend(&rewards) == LearningTrend::Improving {
        out.push("Recent feedback is trending positive".to_string());
    }

    if out.is_empty() {
        out.push("Not enough feedback yet to draw conclusions".to_string());
    }
    out
}

/// Full analytics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub total_decisions: usize,
    pub total_feedback: usize,
    pub recommendations: BTreeMap<String, usize>,
    pub outcomes: OutcomeCounts,
    pub success_rate: f64,
    pub rewards: RewardSummary,
    pub velocity: UpdateVelocity,
    pub average_learning_delta: f64,
    pub top_tokens: Vec<WeightEntry>,
    pub distribution: SkillDistribution,
}

pub fn analytics_report(
    log: &AnalyticsLog,
    store: &WeightStore,
    config: &AnalyticsConfig,
    now: DateTime<Utc>,
) -> AnalyticsReport {
    let deltas: Vec<f64> = log.feedback().map(|f| f.learning_delta()).collect();
    let average_learning_delta = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    };

    AnalyticsReport {
        generated_at: now,
        total_decisions: log.decisions().count(),
        total_feedback: deltas.len(),
        recommendations: recommendation_counts(log),
        outcomes: outcome_counts(log),
        success_rate: rolling_success_rate(log, config.success_window),
        rewards: reward_summary(log),
        velocity: update_velocity(log, Duration::minutes(config.velocity_window_minutes), now),
        average_learning_delta,
        top_tokens: top_tokens(store, config.top_n),
        distribution: skill_distribution(store),
    }
}
