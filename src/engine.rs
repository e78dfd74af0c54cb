//! Hiring engine - the facade callers talk to
//!
//! Owns the brain state, the analytics log and the persistence sink.
//!
//! Updates serialize on the brain lock, which is only held while the update
//! is computed. Each update publishes an immutable weight snapshot; `decide`
//! and the read-only views score against the latest snapshot and never wait
//! on the brain lock or on disk. Flushes run afterwards under their own mutex
//! and carry the state version they serialized, so an older state never
//! overwrites a newer one on disk.

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::analytics::{self, AnalyticsLog, AnalyticsReport, BrainSummary, FeedbackRecord, LogEntry};
use crate::brain::persist::{write_with_retry, FileStateSink, RetryPolicy, StateSink};
use crate::brain::{BrainState, PolicyUpdater, Scorer, UpdateReport, WeightEntry, WeightStore};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::types::{Candidate, Decision, FeedbackEvent, FeedbackRequest};

/// Whether the latest state has reached durable storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Durability {
    /// Last flush succeeded
    Durable,
    /// Last flush failed after every retry; memory is ahead of disk
    Degraded { attempts: u32, reason: String },
    /// No sink configured
    InMemory,
}

impl Durability {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Durability::Degraded { .. })
    }
}

/// Result of submitting one feedback event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub report: UpdateReport,
    /// The event had already been applied; `report` is the original result
    pub replayed: bool,
    pub prediction_before: Option<f64>,
    pub prediction_after: Option<f64>,
    pub durability: Durability,
}

impl FeedbackReceipt {
    pub fn learning_delta(&self) -> Option<f64> {
        Some(self.prediction_after? - self.prediction_before?)
    }
}

#[derive(Debug)]
struct Brain {
    state: BrainState,
    updater: PolicyUpdater,
    /// Bumped on every change that needs flushing
    version: u64,
}

/// Serialized state waiting to be written
struct PendingFlush {
    version: u64,
    text: String,
}

pub struct HiringEngine {
    config: Config,
    scorer: Scorer,
    brain: RwLock<Brain>,
    /// Weights as of the last applied update
    published: RwLock<Arc<WeightStore>>,
    analytics: RwLock<AnalyticsLog>,
    sink: Option<Box<dyn StateSink>>,
    retry: RetryPolicy,
    /// Highest state version written to the sink
    flushed: Mutex<u64>,
    durability: RwLock<Durability>,
}

impl HiringEngine {
    /// Engine with no durable storage and an in-memory analytics log
    pub fn in_memory(config: Config) -> Self {
        let state = BrainState::from_config(&config);
        Self::assemble(config, state, AnalyticsLog::new(), None)
    }

    /// Engine backed by the configured state and analytics files
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let state_path = config.persistence.state_path()?;
        let analytics_path = config.persistence.analytics_path()?;
        let log = AnalyticsLog::open(&analytics_path)
            .with_context(|| format!("Failed to open analytics log {}", analytics_path.display()))?;

        let engine = Self::with_sink(config, Box::new(FileStateSink::new(&state_path)), log)
            .await
            .with_context(|| format!("Failed to load brain state from {}", state_path.display()))?;
        Ok(engine)
    }

    /// Engine over an arbitrary sink, restoring any state it already holds.
    ///
    /// A restored state keeps its own learning rate and decay factor; the
    /// `[learning]` values only seed a fresh brain.
    pub async fn with_sink(
        config: Config,
        sink: Box<dyn StateSink>,
        log: AnalyticsLog,
    ) -> EngineResult<Self> {
        let bounds = config.weights.clone().into();
        let state = match sink.read().await? {
            Some(text) => {
                let state = BrainState::load(&text, bounds)?;
                info!(
                    "Restored brain state from {} ({} tokens, {} applied events)",
                    sink.describe(),
                    state.weights.len(),
                    state.applied.len()
                );
                let learning = &config.learning;
                if state.learning_rate != learning.learning_rate
                    || state.decay_factor != learning.decay_factor
                {
                    warn!(
                        "Saved learning_rate {} / decay_factor {} take precedence over configured {} / {}",
                        state.learning_rate,
                        state.decay_factor,
                        learning.learning_rate,
                        learning.decay_factor
                    );
                }
                state
            }
            None => {
                debug!("No saved state at {}, starting fresh", sink.describe());
                BrainState::from_config(&config)
            }
        };
        Ok(Self::assemble(config, state, log, Some(sink)))
    }

    fn assemble(
        config: Config,
        state: BrainState,
        log: AnalyticsLog,
        sink: Option<Box<dyn StateSink>>,
    ) -> Self {
        let durability = if sink.is_some() { Durability::Durable } else { Durability::InMemory };
        Self {
            scorer: Scorer::new(config.scoring.clone()),
            published: RwLock::new(Arc::new(state.weights.clone())),
            brain: RwLock::new(Brain {
                state,
                updater: PolicyUpdater::new(config.learning.clone()),
                version: 0,
            }),
            analytics: RwLock::new(log),
            retry: (&config.persistence).into(),
            sink,
            flushed: Mutex::new(0),
            durability: RwLock::new(durability),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Latest published weights. Never waits on an update or a flush.
    async fn current_weights(&self) -> Arc<WeightStore> {
        self.published.read().await.clone()
    }

    /// Score a candidate. Never fails; the only side effect is a log append.
    pub async fn decide(&self, candidate: &Candidate) -> Decision {
        let weights = self.current_weights().await;
        let decision = self.scorer.decide(candidate, &weights);
        self.analytics.write().await.append_decision(decision.clone());
        decision
    }

    /// Validate a raw submission and apply it
    pub async fn submit(&self, request: FeedbackRequest) -> EngineResult<FeedbackReceipt> {
        self.feedback(request.into_event()?).await
    }

    /// Apply one feedback event, log it and flush the new state
    pub async fn feedback(&self, event: FeedbackEvent) -> EngineResult<FeedbackReceipt> {
        event.validate()?;

        let prior = {
            let log = self.analytics.read().await;
            match event.correlated_decision {
                Some(id) => Some(log.decision_by_id(id).cloned().ok_or_else(|| {
                    EngineError::validation(format!("unknown decision {}", id))
                })?),
                None => log.last_decision_for(&event.candidate_id).cloned(),
            }
        };

        let (report, prediction_before, prediction_after, pending) = {
            let mut guard = self.brain.write().await;
            let brain = &mut *guard;

            let tokens = PolicyUpdater::tokens_for(&event, prior.as_ref());
            let prediction_before = self.scorer.probability_for(&tokens, &brain.state.weights);

            let report = match brain.updater.apply(&event, prior.as_ref(), &mut brain.state) {
                Ok(report) => report,
                Err(EngineError::DuplicateEvent { key, prior }) => {
                    drop(guard);
                    debug!("Feedback {} replayed, returning stored result", key);
                    return Ok(self.replayed_receipt(*prior).await);
                }
                Err(e) => return Err(e),
            };
            let prediction_after = self.scorer.probability_for(&tokens, &brain.state.weights);

            brain.version += 1;
            *self.published.write().await = Arc::new(brain.state.weights.clone());

            let pending = if self.sink.is_some() {
                brain.state.last_flush = Some(Utc::now());
                Some(PendingFlush {
                    version: brain.version,
                    text: brain.state.dump()?,
                })
            } else {
                None
            };

            // Logged under the brain lock so the log follows update order
            self.analytics.write().await.append_feedback(FeedbackRecord {
                event,
                decision_id: prior.as_ref().map(|d| d.id),
                report: report.clone(),
                prediction_before,
                prediction_after,
            });

            (report, prediction_before, prediction_after, pending)
        };

        let durability = match pending {
            Some(pending) => self.flush_pending(pending).await,
            None => Durability::InMemory,
        };

        Ok(FeedbackReceipt {
            report,
            replayed: false,
            prediction_before: Some(prediction_before),
            prediction_after: Some(prediction_after),
            durability,
        })
    }

    async fn replayed_receipt(&self, report: UpdateReport) -> FeedbackReceipt {
        let (before, after) = {
            let log = self.analytics.read().await;
            let predictions = log
                .feedback()
                .find(|f| f.report.event_key == report.event_key)
                .map(|f| (Some(f.prediction_before), Some(f.prediction_after)))
                .unwrap_or((None, None));
            predictions
        };
        FeedbackReceipt {
            report,
            replayed: true,
            prediction_before: before,
            prediction_after: after,
            durability: self.durability().await,
        }
    }

    /// Write `pending` unless a newer version already reached the sink
    async fn flush_pending(&self, pending: PendingFlush) -> Durability {
        let Some(sink) = self.sink.as_deref() else {
            return Durability::InMemory;
        };

        let mut flushed = self.flushed.lock().await;
        if *flushed >= pending.version {
            debug!("State version {} superseded by {}, skipping flush", pending.version, *flushed);
            return self.durability().await;
        }

        let outcome = match write_with_retry(sink, &pending.text, self.retry).await {
            Ok(_) => {
                *flushed = pending.version;
                Durability::Durable
            }
            Err(EngineError::Persistence { attempts, reason }) => {
                warn!(
                    "Brain state not persisted after {} attempt(s), durability degraded: {}",
                    attempts, reason
                );
                Durability::Degraded { attempts, reason }
            }
            Err(e) => {
                warn!("Brain state not persisted, durability degraded: {}", e);
                Durability::Degraded { attempts: 0, reason: e.to_string() }
            }
        };
        *self.durability.write().await = outcome.clone();
        outcome
    }

    /// Flush the current state now, e.g. after degraded durability
    pub async fn flush(&self) -> EngineResult<Durability> {
        if self.sink.is_none() {
            return Ok(Durability::InMemory);
        }
        let pending = {
            let mut brain = self.brain.write().await;
            brain.version += 1;
            brain.state.last_flush = Some(Utc::now());
            PendingFlush {
                version: brain.version,
                text: brain.state.dump()?,
            }
        };
        let durability = self.flush_pending(pending).await;
        if let Durability::Degraded { attempts, reason } = &durability {
            return Err(EngineError::Persistence {
                attempts: *attempts,
                reason: reason.clone(),
            });
        }
        info!("Brain state flushed");
        Ok(durability)
    }

    pub async fn durability(&self) -> Durability {
        self.durability.read().await.clone()
    }

    /// Saved learning rate and decay factor in effect
    pub async fn learning_parameters(&self) -> (f64, f64) {
        let brain = self.brain.read().await;
        (brain.state.learning_rate, brain.state.decay_factor)
    }

    /// Point-in-time copy of every weight, ordered by token
    pub async fn snapshot(&self) -> Vec<WeightEntry> {
        self.current_weights().await.snapshot()
    }

    pub async fn weights(&self) -> WeightStore {
        self.current_weights().await.as_ref().clone()
    }

    /// Serialized brain state, as it would be persisted
    pub async fn dump(&self) -> EngineResult<String> {
        self.brain.read().await.state.dump()
    }

    pub async fn top(&self, n: usize) -> Vec<WeightEntry> {
        analytics::top_tokens(&*self.current_weights().await, n)
    }

    pub async fn brain_summary(&self) -> BrainSummary {
        analytics::brain_summary(&*self.current_weights().await, self.config.analytics.top_n)
    }

    pub async fn analytics_report(&self) -> AnalyticsReport {
        let weights = self.current_weights().await;
        let log = self.analytics.read().await;
        analytics::analytics_report(&log, &weights, &self.config.analytics, Utc::now())
    }

    pub async fn insights(&self) -> Vec<String> {
        let weights = self.current_weights().await;
        let log = self.analytics.read().await;
        analytics::insights(&weights, &log)
    }

    /// Decisions and feedback for one candidate, oldest first
    pub async fn history(&self, candidate_id: &str) -> Vec<LogEntry> {
        self.analytics
            .read()
            .await
            .candidate_timeline(candidate_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn log_len(&self) -> usize {
        self.analytics.read().await.len()
    }
}
