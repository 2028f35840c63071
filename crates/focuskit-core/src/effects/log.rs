//! Per-effect outcome logging for the completion protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the completion sub-effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Persist,
    Sound,
    Notification,
}

/// Status of a single sub-effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EffectStatus {
    /// Effect completed
    Success,
    /// Effect was attempted and failed
    Failed {
        /// Human-readable reason for failure
        reason: String,
    },
    /// Effect was not attempted
    Skipped {
        /// Human-readable reason for skip
        reason: String,
    },
}

/// Result of running a single sub-effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectResult {
    pub effect: EffectKind,
    pub status: EffectStatus,
}

/// Outcome of one completion protocol run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    /// When the effects ran
    pub executed_at: DateTime<Utc>,
    /// Results in execution order
    pub results: Vec<EffectResult>,
}

impl CompletionReport {
    /// Create a new report
    pub fn new(results: Vec<EffectResult>) -> Self {
        Self {
            executed_at: Utc::now(),
            results,
        }
    }

    /// Status recorded for `effect`, if it ran at all.
    pub fn status(&self, effect: EffectKind) -> Option<&EffectStatus> {
        self.results
            .iter()
            .find(|r| r.effect == effect)
            .map(|r| &r.status)
    }

    /// Whether `effect` completed.
    pub fn succeeded(&self, effect: EffectKind) -> bool {
        matches!(self.status(effect), Some(EffectStatus::Success))
    }

    /// Get the number of successful effects
    pub fn success_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, EffectStatus::Success))
            .count()
    }

    /// Get the number of failed effects
    pub fn failure_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, EffectStatus::Failed { .. }))
            .count()
    }

    /// Get the number of skipped effects
    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, EffectStatus::Skipped { .. }))
            .count()
    }
}
