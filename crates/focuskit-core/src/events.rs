use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::effects::CompletionReport;
use crate::storage::{Configuration, SessionRecord};
use crate::task::TaskRef;
use crate::timer::{EngineState, Phase};

/// Every state change in the engine produces an Event.
/// The host prints or renders them; observers subscribe to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PhaseStarted {
        phase: Phase,
        remaining_secs: u64,
        /// `true` when continuing a partially elapsed countdown.
        resumed: bool,
        at: DateTime<Utc>,
    },
    PhasePaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseReset {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseSwitched {
        from: Phase,
        to: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero and the engine moved on.
    PhaseCompleted {
        record: SessionRecord,
        next_phase: Phase,
        auto_started: bool,
        completed_focus_phases: u64,
        report: CompletionReport,
        at: DateTime<Utc>,
    },
    /// Elapsed part of a phase was recorded on request.
    SessionCommitted {
        record: SessionRecord,
        persisted: bool,
        at: DateTime<Utc>,
    },
    ConfigurationChanged {
        config: Configuration,
        /// Whether the current countdown was resized to the new duration.
        resized: bool,
        at: DateTime<Utc>,
    },
    TaskAssociated {
        task_ref: Option<TaskRef>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: EngineState,
        total_secs: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable snake_case name, e.g. for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Event::PhaseStarted { .. } => "phase_started",
            Event::PhasePaused { .. } => "phase_paused",
            Event::PhaseReset { .. } => "phase_reset",
            Event::PhaseSwitched { .. } => "phase_switched",
            Event::PhaseCompleted { .. } => "phase_completed",
            Event::SessionCommitted { .. } => "session_committed",
            Event::ConfigurationChanged { .. } => "configuration_changed",
            Event::TaskAssociated { .. } => "task_associated",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}

/// Subscriber to engine events (notification UI, statistics, ...).
pub trait SessionObserver {
    fn on_event(&self, event: &Event);
}

impl<F: Fn(&Event)> SessionObserver for F {
    fn on_event(&self, event: &Event) {
        self(event)
    }
}
