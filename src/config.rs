//! Configuration management
//!
//! Scoring thresholds, weight bounds, learning parameters and persistence
//! settings, loaded from `config.toml` in the project config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Decision function parameters
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Weight bounds and baseline
    #[serde(default)]
    pub weights: WeightsConfig,
    /// Policy update parameters
    #[serde(default)]
    pub learning: LearningConfig,
    /// Durable state settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Analytics view settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Sigmoid steepness k
    #[serde(default = "default_steepness")]
    pub steepness: f64,
    /// Matched skill count at which confidence saturates
    #[serde(default = "default_reference_skill_count")]
    pub reference_skill_count: usize,
    /// Probability at or above which hiring is recommended
    #[serde(default = "default_hire_threshold")]
    pub hire_threshold: f64,
    /// Probability at or below which rejection is recommended
    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: f64,
}

fn default_steepness() -> f64 {
    6.0
}

fn default_reference_skill_count() -> usize {
    5
}

fn default_hire_threshold() -> f64 {
    0.65
}

fn default_reject_threshold() -> f64 {
    0.35
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            steepness: default_steepness(),
            reference_skill_count: default_reference_skill_count(),
            hire_threshold: default_hire_threshold(),
            reject_threshold: default_reject_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_min_weight")]
    pub min: f64,
    #[serde(default = "default_max_weight")]
    pub max: f64,
    /// Weight given to newly discovered tokens; also the sigmoid midpoint
    #[serde(default = "default_baseline_weight")]
    pub baseline: f64,
    /// Clamp out-of-range updates silently instead of failing
    #[serde(default = "default_true")]
    pub clamp: bool,
}

fn default_min_weight() -> f64 {
    0.05
}

fn default_max_weight() -> f64 {
    3.0
}

fn default_baseline_weight() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            min: default_min_weight(),
            max: default_max_weight(),
            baseline: default_baseline_weight(),
            clamp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Step size for a fresh brain. Once a state file exists, the learning
    /// rate and decay factor saved in it take precedence over this section.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Damps growth of weights already close to the maximum
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
    /// Probability ε of jittering one token per update (0 disables)
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,
    /// Largest absolute jitter applied when exploring
    #[serde(default = "default_exploration_jitter")]
    pub exploration_jitter: f64,
    /// Fixed RNG seed for reproducible exploration
    #[serde(default)]
    pub seed: Option<u64>,
    /// Share of the reward taken from the numeric score
    #[serde(default = "default_score_share")]
    pub score_share: f64,
    /// Share of the reward taken from the outcome
    #[serde(default = "default_outcome_share")]
    pub outcome_share: f64,
    /// Multiplier applied to the whole reward for `reconsider`
    #[serde(default = "default_reconsider_damping")]
    pub reconsider_damping: f64,
}

fn default_learning_rate() -> f64 {
    0.15
}

fn default_decay_factor() -> f64 {
    0.5
}

fn default_exploration_rate() -> f64 {
    0.1
}

fn default_exploration_jitter() -> f64 {
    0.05
}

fn default_score_share() -> f64 {
    0.4
}

fn default_outcome_share() -> f64 {
    0.6
}

fn default_reconsider_damping() -> f64 {
    0.25
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            decay_factor: default_decay_factor(),
            exploration_rate: default_exploration_rate(),
            exploration_jitter: default_exploration_jitter(),
            seed: None,
            score_share: default_score_share(),
            outcome_share: default_outcome_share(),
            reconsider_damping: default_reconsider_damping(),
        }
    }
}

impl LearningConfig {
    /// Same parameters with exploration switched off
    pub fn deterministic(mut self) -> Self {
        self.exploration_rate = 0.0;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Brain state file (defaults to `brain_state.json` in the data dir)
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Analytics JSON-lines file (defaults to `analytics.jsonl` in the data dir)
    #[serde(default)]
    pub analytics_file: Option<PathBuf>,
    /// Retries after the first failed flush attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial backoff between attempts, doubled each retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    50
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: None,
            analytics_file: None,
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl PersistenceConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn state_path(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("brain_state.json")),
        }
    }

    pub fn analytics_path(&self) -> Result<PathBuf> {
        match &self.analytics_file {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("analytics.jsonl")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of recent feedback events in the rolling success rate
    #[serde(default = "default_success_window")]
    pub success_window: usize,
    /// Window over which update velocity is measured
    #[serde(default = "default_velocity_window_minutes")]
    pub velocity_window_minutes: i64,
    /// Tokens listed in top-N views
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_success_window() -> usize {
    20
}

fn default_velocity_window_minutes() -> i64 {
    60
}

fn default_top_n() -> usize {
    10
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            success_window: default_success_window(),
            velocity_window_minutes: default_velocity_window_minutes(),
            top_n: default_top_n(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults if absent
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject combinations the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if !(0.0..=1.0).contains(&s.reject_threshold) || !(0.0..=1.0).contains(&s.hire_threshold) {
            anyhow::bail!("Scoring thresholds must lie in [0, 1]");
        }
        if s.reject_threshold >= s.hire_threshold {
            anyhow::bail!(
                "reject_threshold ({}) must be below hire_threshold ({})",
                s.reject_threshold, s.hire_threshold
            );
        }
        if !s.steepness.is_finite() || s.steepness <= 0.0 {
            anyhow::bail!("Sigmoid steepness must be a positive number");
        }
        if s.reference_skill_count == 0 {
            anyhow::bail!("reference_skill_count must be at least 1");
        }

        let w = &self.weights;
        if !(w.min.is_finite() && w.max.is_finite()) {
            anyhow::bail!("Weight bounds must be finite");
        }
        if !(w.min > 0.0 && w.min < w.max) {
            anyhow::bail!("Weight bounds must satisfy 0 < min < max (got {} / {})", w.min, w.max);
        }
        if !(w.min..=w.max).contains(&w.baseline) {
            anyhow::bail!("Baseline weight {} outside [{}, {}]", w.baseline, w.min, w.max);
        }

        let l = &self.learning;
        for (name, value) in [
            ("learning_rate", l.learning_rate),
            ("decay_factor", l.decay_factor),
            ("exploration_rate", l.exploration_rate),
            ("exploration_jitter", l.exploration_jitter),
            ("score_share", l.score_share),
            ("outcome_share", l.outcome_share),
            ("reconsider_damping", l.reconsider_damping),
        ] {
            if !value.is_finite() {
                anyhow::bail!("{} must be a finite number", name);
            }
        }
        if l.learning_rate < 0.0 {
            anyhow::bail!("learning_rate must not be negative");
        }
        if !(0.0..=1.0).contains(&l.decay_factor) {
            anyhow::bail!("decay_factor must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&l.exploration_rate) {
            anyhow::bail!("exploration_rate must lie in [0, 1]");
        }
        if l.exploration_jitter < 0.0 {
            anyhow::bail!("exploration_jitter must not be negative");
        }
        if l.score_share < 0.0 || l.outcome_share < 0.0 {
            anyhow::bail!("Reward shares must not be negative");
        }

        if self.analytics.success_window == 0 {
            anyhow::bail!("analytics.success_window must be at least 1");
        }
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "hire-brain", "hire-brain")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "hire-brain", "hire-brain")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.weights.baseline, 0.5);
        assert_eq!(config.learning.learning_rate, 0.15);
        assert_eq!(config.scoring.reference_skill_count, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[learning]\nlearning_rate = 0.3\n").unwrap();
        assert_eq!(config.learning.learning_rate, 0.3);
        assert_eq!(config.learning.decay_factor, 0.5);
        assert_eq!(config.scoring, ScoringConfig::default());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.scoring.reject_threshold = 0.7;
        config.scoring.hire_threshold = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut config = Config::default();
        config.weights.baseline = 4.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.weights.min = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_numbers() {
        let cases: Vec<fn(&mut Config)> = vec![
            |c: &mut Config| c.scoring.steepness = f64::NAN,
            |c: &mut Config| c.scoring.steepness = f64::INFINITY,
            |c: &mut Config| c.scoring.hire_threshold = f64::NAN,
            |c: &mut Config| c.weights.max = f64::INFINITY,
            |c: &mut Config| c.learning.learning_rate = f64::NAN,
            |c: &mut Config| c.learning.decay_factor = f64::NAN,
            |c: &mut Config| c.learning.exploration_jitter = f64::NAN,
            |c: &mut Config| c.learning.exploration_jitter = f64::INFINITY,
            |c: &mut Config| c.learning.score_share = f64::NAN,
            |c: &mut Config| c.learning.outcome_share = f64::INFINITY,
            |c: &mut Config| c.learning.reconsider_damping = f64::NAN,
        ];
        for (i, apply) in cases.into_iter().enumerate() {
            let mut config = Config::default();
            apply(&mut config);
            assert!(config.validate().is_err(), "case {} accepted", i);
        }
    }

    #[test]
    fn test_nan_steepness_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scoring]\nsteepness = nan\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.learning.seed = Some(42);
        config.persistence.state_file = Some(dir.path().join("state.json"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_config_toml_parses() {
        let text = default_config_toml();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
