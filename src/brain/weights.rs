//! Weight store - skill token to weight mapping with lifecycle metadata
//!
//! The store is the only writer of weights. Reads never register tokens;
//! discovery is an explicit call made by the policy updater.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::normalizer::normalize;
use crate::config::WeightsConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::SkillToken;

/// One learned weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub token: SkillToken,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub update_count: u64,
}

/// Bounds every weight must respect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBounds {
    pub min: f64,
    pub max: f64,
    pub baseline: f64,
    pub clamp: bool,
}

impl WeightBounds {
    /// Clamp `weight`, or fail if clamping is disabled and it is out of range
    pub fn enforce(&self, token: &SkillToken, weight: f64) -> EngineResult<f64> {
        if (self.min..=self.max).contains(&weight) {
            return Ok(weight);
        }
        if self.clamp && !weight.is_nan() {
            return Ok(weight.clamp(self.min, self.max));
        }
        Err(EngineError::OutOfRange {
            token: token.to_string(),
            weight,
            min: self.min,
            max: self.max,
        })
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        WeightsConfig::default().into()
    }
}

impl From<WeightsConfig> for WeightBounds {
    fn from(config: WeightsConfig) -> Self {
        Self {
            min: config.min,
            max: config.max,
            baseline: config.baseline,
            clamp: config.clamp,
        }
    }
}

/// Token -> weight mapping, ordered by token
#[derive(Debug, Clone, PartialEq)]
pub struct WeightStore {
    entries: BTreeMap<SkillToken, WeightEntry>,
    bounds: WeightBounds,
}

impl WeightStore {
    pub fn new(bounds: WeightBounds) -> Self {
        Self {
            entries: BTreeMap::new(),
            bounds,
        }
    }

    pub fn bounds(&self) -> WeightBounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, token: &SkillToken) -> bool {
        self.entries.contains_key(token)
    }

    pub fn get(&self, token: &SkillToken) -> Option<&WeightEntry> {
        self.entries.get(token)
    }

    /// Current weight, or the baseline for unseen tokens. Never mutates.
    pub fn get_or_default(&self, token: &SkillToken) -> f64 {
        self.entries
            .get(token)
            .map(|e| e.weight)
            .unwrap_or(self.bounds.baseline)
    }

    /// Register an unseen token at the baseline weight. Returns false if it already existed.
    pub fn discover(&mut self, token: &SkillToken) -> bool {
        if self.entries.contains_key(token) {
            return false;
        }
        let now = Utc::now();
        self.entries.insert(token.clone(), WeightEntry {
            token: token.clone(),
            weight: self.bounds.baseline,
            created_at: now,
            updated_at: now,
            update_count: 0,
        });
        debug!("Discovered skill token '{}' at baseline {}", token, self.bounds.baseline);
        true
    }

    /// Write a new weight for `token`, enforcing bounds. Returns the stored value.
    pub fn upsert(&mut self, token: &SkillToken, new_weight: f64) -> EngineResult<f64> {
        let weight = self.bounds.enforce(token, new_weight)?;
        let now = Utc::now();
        let entry = self.entries.entry(token.clone()).or_insert_with(|| WeightEntry {
            token: token.clone(),
            weight,
            created_at: now,
            updated_at: now,
            update_count: 0,
        });
        entry.weight = weight;
        entry.updated_at = now;
        entry.update_count += 1;
        Ok(weight)
    }

    /// Point-in-time copy of every entry, ordered by token
    pub fn snapshot(&self) -> Vec<WeightEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightEntry> {
        self.entries.values()
    }

    /// Entries sorted by weight, highest first (ties broken by token)
    pub fn ranked(&self) -> Vec<&WeightEntry> {
        let mut ranked: Vec<_> = self.entries.values().collect();
        ranked.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.token.cmp(&b.token))
        });
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<WeightEntry> {
        self.ranked().into_iter().take(n).cloned().collect()
    }

    /// Serialize the entries as JSON
    pub fn dump(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Rebuild a store from `dump` output
    pub fn load(serialized: &str, bounds: WeightBounds) -> EngineResult<Self> {
        let entries: Vec<WeightEntry> = serde_json::from_str(serialized)?;
        Self::from_entries(entries, bounds)
    }

    /// Rebuild a store from saved entries, enforcing the current bounds.
    ///
    /// Weights outside `bounds` are clamped (or rejected when clamping is
    /// off). Non-finite weights, tokens that are not in normalized form and
    /// repeated tokens are rejected.
    pub fn from_entries(entries: Vec<WeightEntry>, bounds: WeightBounds) -> EngineResult<Self> {
        let mut map = BTreeMap::new();
        for mut entry in entries {
            if !entry.weight.is_finite() {
                return Err(EngineError::validation(format!(
                    "stored weight for '{}' is not finite",
                    entry.token
                )));
            }
            let key = normalize(entry.token.as_str());
            if key != entry.token || key.is_empty() {
                return Err(EngineError::validation(format!(
                    "stored token '{}' is not normalized",
                    entry.token
                )));
            }
            let weight = bounds.enforce(&key, entry.weight)?;
            if weight != entry.weight {
                warn!(
                    "Stored weight {} for '{}' outside [{}, {}], clamped to {}",
                    entry.weight, key, bounds.min, bounds.max, weight
                );
                entry.weight = weight;
            }
            if map.insert(key.clone(), entry).is_some() {
                return Err(EngineError::validation(format!("stored token '{}' appears twice", key)));
            }
        }
        Ok(Self { entries: map, bounds })
    }
}

impl Default for WeightStore {
    fn default() -> Self {
        Self::new(WeightBounds::default())
    }
}
