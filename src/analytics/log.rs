//! Analytics log - append-only record of decisions and feedback
//!
//! Entries are never mutated once appended. When opened with a path, each
//! entry is mirrored to a JSON-lines file and earlier lines are loaded back
//! on open.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::brain::policy::UpdateReport;
use crate::types::{Decision, FeedbackEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Decision,
    Feedback,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Decision => write!(f, "decision"),
            EntryKind::Feedback => write!(f, "feedback"),
        }
    }
}

/// An applied feedback event with its effect on the brain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub event: FeedbackEvent,
    /// Decision the event was correlated with, if any
    pub decision_id: Option<Uuid>,
    pub report: UpdateReport,
    /// Success probability of the candidate's tokens before the update
    pub prediction_before: f64,
    /// ...and after it
    pub prediction_after: f64,
}

impl FeedbackRecord {
    pub fn learning_delta(&self) -> f64 {
        self.prediction_after - self.prediction_before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum LogPayload {
    Decision(Decision),
    Feedback(FeedbackRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub entry: LogPayload,
}

impl LogEntry {
    pub fn kind(&self) -> EntryKind {
        match self.entry {
            LogPayload::Decision(_) => EntryKind::Decision,
            LogPayload::Feedback(_) => EntryKind::Feedback,
        }
    }
}

/// Append-only event log
#[derive(Debug, Default)]
pub struct AnalyticsLog {
    entries: Vec<LogEntry>,
    mirror: Option<PathBuf>,
}

impl AnalyticsLog {
    /// In-memory log with no file mirror
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a log mirrored to `path`, loading any existing entries
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create analytics directory")?;
            }
        }

        let mut entries = Vec::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Skipping malformed analytics line {}: {}", line_no + 1, e),
                }
            }
            debug!("Loaded {} analytics entries from {}", entries.len(), path.display());
        }

        Ok(Self {
            entries,
            mirror: Some(path),
        })
    }

    pub fn mirror_path(&self) -> Option<&Path> {
        self.mirror.as_deref()
    }

    fn next_seq(&self) -> u64 {
        self.entries.last().map(|e| e.seq + 1).unwrap_or(0)
    }

    fn append(&mut self, entry: LogPayload) -> &LogEntry {
        let timestamp = match &entry {
            LogPayload::Decision(d) => d.timestamp,
            LogPayload::Feedback(f) => f.report.applied_at,
        };
        let entry = LogEntry {
            seq: self.next_seq(),
            timestamp,
            entry,
        };

        if let Some(path) = &self.mirror {
            // The in-memory log stays authoritative if the mirror write fails
            if let Err(e) = append_line(path, &entry) {
                warn!("Failed to mirror analytics entry to {}: {}", path.display(), e);
            }
        }

        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn append_decision(&mut self, decision: Decision) -> &LogEntry {
        self.append(LogPayload::Decision(decision))
    }

    pub fn append_feedback(&mut self, record: FeedbackRecord) -> &LogEntry {
        self.append(LogPayload::Feedback(record))
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.entries.iter().filter_map(|e| match &e.entry {
            LogPayload::Decision(d) => Some(d),
            _ => None,
        })
    }

    pub fn feedback(&self) -> impl Iterator<Item = &FeedbackRecord> {
        self.entries.iter().filter_map(|e| match &e.entry {
            LogPayload::Feedback(f) => Some(f),
            _ => None,
        })
    }

    pub fn decision_by_id(&self, id: Uuid) -> Option<&Decision> {
        self.decisions().find(|d| d.id == id)
    }

    /// Most recent decision for a candidate
    pub fn last_decision_for(&self, candidate_id: &str) -> Option<&Decision> {
        self.entries.iter().rev().find_map(|e| match &e.entry {
            LogPayload::Decision(d) if d.candidate_id == candidate_id => Some(d),
            _ => None,
        })
    }

    /// Entries for one candidate in log order
    pub fn candidate_timeline(&self, candidate_id: &str) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| match &e.entry {
                LogPayload::Decision(d) => d.candidate_id == candidate_id,
                LogPayload::Feedback(f) => f.event.candidate_id == candidate_id,
            })
            .collect()
    }
}

fn append_line(path: &Path, entry: &LogEntry) -> Result<()> {
    let line = serde_json::to_string(entry)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}", line)?;
    Ok(())
}
