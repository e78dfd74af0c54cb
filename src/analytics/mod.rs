//! Analytics - decision and feedback history with derived statistics
//!
//! - `log`: append-only record of decisions and applied feedback
//! - `views`: reward, success-rate, velocity and weight summaries

pub mod log;
pub mod views;

pub use log::{AnalyticsLog, EntryKind, FeedbackRecord, LogEntry, LogPayload};
pub use views::{
    analytics_report, brain_summary, cumulative_reward, insights, learning_trend,
    rolling_success_rate, top_tokens, update_velocity, AnalyticsReport, BrainSummary,
    LearningTrend, OutcomeCounts, RewardPoint, RewardSummary, SkillDistribution, UpdateVelocity,
};
