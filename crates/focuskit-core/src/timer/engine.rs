//! Focus-session engine.
//!
//! The engine is a tick-driven state machine. It does not own a timer:
//! the host calls `tick()` once per second while it wants time to pass.
//!
//! ## Phase Transitions
//!
//! ```text
//! Focus -> ShortBreak -> Focus -> ... -> Focus -> LongBreak -> Focus
//!          (every `longBreakInterval`-th completed focus gets LongBreak)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionEngine::new(settings, effects);
//! engine.start();
//! // Once per second:
//! engine.tick(); // Returns Some(Event::PhaseCompleted) at a phase boundary
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::phase::{next_phase, Phase};
use crate::effects::{Completion, CompletionAdapter, EffectStatus};
use crate::error::ConfigError;
use crate::events::{Event, SessionObserver};
use crate::storage::{ConfigStore, Configuration, SessionRecord};
use crate::task::TaskRef;

/// Observable engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub phase: Phase,
    pub remaining_secs: u64,
    pub running: bool,
    pub completed_focus_phases: u64,
    #[serde(default)]
    pub task_ref: Option<TaskRef>,
}

/// Core session engine.
///
/// Exactly one live instance per timer session; `tick()` must come from a
/// single timer source.
pub struct SessionEngine {
    settings: ConfigStore,
    effects: CompletionAdapter,
    observers: Vec<Box<dyn SessionObserver>>,
    state: EngineState,
    /// Length of the in-flight phase, fixed when the phase was entered.
    phase_total_secs: u64,
    /// First start of the in-flight phase.
    phase_started_at: Option<DateTime<Utc>>,
}

impl SessionEngine {
    /// Create an engine at the start of a `Focus` phase.
    pub fn new(settings: ConfigStore, effects: CompletionAdapter) -> Self {
        let total = Phase::Focus.duration_secs(settings.current());
        Self {
            settings,
            effects,
            observers: Vec::new(),
            state: EngineState {
                phase: Phase::Focus,
                remaining_secs: total,
                running: false,
                completed_focus_phases: 0,
                task_ref: None,
            },
            phase_total_secs: total,
            phase_started_at: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn completed_focus_phases(&self) -> u64 {
        self.state.completed_focus_phases
    }

    pub fn task_ref(&self) -> Option<&TaskRef> {
        self.state.task_ref.as_ref()
    }

    pub fn configuration(&self) -> &Configuration {
        self.settings.current()
    }

    pub fn settings(&self) -> &ConfigStore {
        &self.settings
    }

    /// Length of the in-flight phase in seconds.
    pub fn total_secs(&self) -> u64 {
        self.phase_total_secs
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn phase_progress(&self) -> f64 {
        if self.phase_total_secs == 0 {
            return 0.0;
        }
        1.0 - (self.state.remaining_secs as f64 / self.phase_total_secs as f64)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.state.clone(),
            total_secs: self.phase_total_secs,
            progress_pct: self.phase_progress() * 100.0,
            at: Utc::now(),
        }
    }

    /// Register an observer for every emitted event.
    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.state.running {
            return None; // Already running.
        }
        let resumed = self.state.remaining_secs < self.phase_total_secs;
        self.state.running = true;
        self.phase_started_at.get_or_insert_with(Utc::now);
        debug!(phase = self.state.phase.as_str(), remaining = self.state.remaining_secs, resumed, "phase started");
        Some(self.emit(Event::PhaseStarted {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            resumed,
            at: Utc::now(),
        }))
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        self.state.running = false;
        debug!(phase = self.state.phase.as_str(), remaining = self.state.remaining_secs, "phase paused");
        Some(self.emit(Event::PhasePaused {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        }))
    }

    /// Restart the current phase from its configured duration, stopped.
    pub fn reset(&mut self) -> Option<Event> {
        self.state.running = false;
        self.enter_phase(self.state.phase);
        Some(self.emit(Event::PhaseReset {
            phase: self.state.phase,
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        }))
    }

    /// Jump to `phase`, stopped, without touching the focus counter.
    pub fn switch_to(&mut self, phase: Phase) -> Option<Event> {
        let from = self.state.phase;
        self.state.running = false;
        self.enter_phase(phase);
        debug!(from = from.as_str(), to = phase.as_str(), "phase switched");
        Some(self.emit(Event::PhaseSwitched {
            from,
            to: phase,
            remaining_secs: self.state.remaining_secs,
            at: Utc::now(),
        }))
    }

    /// Call once per second. Returns `Some(Event::PhaseCompleted)` when the
    /// countdown reaches zero; a tick while stopped does nothing.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        self.state.remaining_secs = self.state.remaining_secs.saturating_sub(1);
        if self.state.remaining_secs > 0 {
            return None;
        }
        Some(self.complete())
    }

    /// Replace the configuration.
    ///
    /// When stopped, the current phase is resized to its new duration right
    /// away. When running, the in-flight countdown keeps its length and the
    /// new durations apply from the next phase on.
    ///
    /// # Errors
    /// Rejects invalid settings (or a failed save) before any state changes.
    pub fn set_configuration(&mut self, config: Configuration) -> Result<Event, ConfigError> {
        self.settings.save(config.clone())?;
        let resized = !self.state.running;
        if resized {
            self.enter_phase(self.state.phase);
        }
        debug!(resized, "configuration applied");
        Ok(self.emit(Event::ConfigurationChanged {
            config,
            resized,
            at: Utc::now(),
        }))
    }

    /// Attach (or clear) the task the following sessions are recorded against.
    ///
    /// The reference is not checked against any task list.
    pub fn associate_task(&mut self, task_ref: Option<TaskRef>) -> Event {
        self.state.task_ref = task_ref.clone();
        self.emit(Event::TaskAssociated {
            task_ref,
            at: Utc::now(),
        })
    }

    /// Record the elapsed part of the current phase as an incomplete
    /// session and restart the phase, stopped.
    ///
    /// Returns `None` when no time has elapsed. The focus counter is never
    /// touched.
    pub fn stop_and_commit(&mut self) -> Option<Event> {
        let elapsed = self.phase_total_secs.saturating_sub(self.state.remaining_secs);
        if elapsed == 0 {
            return None;
        }
        let now = Utc::now();
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            task_ref: self.state.task_ref.clone(),
            started_at: self.phase_started_at.unwrap_or(now),
            ended_at: now,
            duration_minutes: whole_minutes(elapsed),
            phase: self.state.phase,
            completed: false,
        };
        self.state.running = false;
        self.enter_phase(self.state.phase);

        let persisted = self.effects.persist(&record) == EffectStatus::Success;
        info!(phase = record.phase.as_str(), elapsed_secs = elapsed, persisted, "session committed");
        Some(self.emit(Event::SessionCommitted {
            record,
            persisted,
            at: now,
        }))
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Completion protocol: commit the transition, then run side effects.
    fn complete(&mut self) -> Event {
        let now = Utc::now();
        let finished = self.state.phase;
        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            task_ref: self.state.task_ref.clone(),
            started_at: self.phase_started_at.unwrap_or(now),
            ended_at: now,
            duration_minutes: whole_minutes(self.phase_total_secs),
            phase: finished,
            completed: true,
        };

        if finished == Phase::Focus {
            self.state.completed_focus_phases += 1;
        }
        let config = self.settings.current().clone();
        let next = next_phase(
            finished,
            self.state.completed_focus_phases,
            config.long_break_interval,
        );
        self.enter_phase(next);
        let auto_started = next.auto_starts(&config);
        self.state.running = auto_started;
        if auto_started {
            self.phase_started_at = Some(now);
        }
        info!(
            finished = finished.as_str(),
            next = next.as_str(),
            completed_focus_phases = self.state.completed_focus_phases,
            auto_started,
            "phase completed"
        );

        let report = self.effects.run(
            &Completion {
                record: &record,
                next_phase: next,
                next_duration_min: next.duration_min(&config),
                auto_started,
            },
            &config,
        );

        self.emit(Event::PhaseCompleted {
            record,
            next_phase: next,
            auto_started,
            completed_focus_phases: self.state.completed_focus_phases,
            report,
            at: now,
        })
    }

    /// Make `phase` current with a full countdown from the active settings.
    fn enter_phase(&mut self, phase: Phase) {
        let total = phase.duration_secs(self.settings.current());
        self.state.phase = phase;
        self.state.remaining_secs = total;
        self.phase_total_secs = total;
        self.phase_started_at = None;
    }

    fn emit(&self, event: Event) -> Event {
        for observer in &self.observers {
            observer.on_event(&event);
        }
        event
    }
}

fn whole_minutes(secs: u64) -> u32 {
    u32::try_from(secs / 60).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemorySessions, MemoryStore};
    use std::rc::Rc;

    fn engine_with(config: Configuration) -> (SessionEngine, Rc<MemorySessions>) {
        let mut settings = ConfigStore::open(MemoryStore::new());
        settings.save(config).unwrap();
        let sessions = Rc::new(MemorySessions::new());
        let engine = SessionEngine::new(settings, CompletionAdapter::new(Rc::clone(&sessions)));
        (engine, sessions)
    }

    fn minutes(focus: u32, short: u32, long: u32, interval: u32) -> Configuration {
        Configuration {
            focus_minutes: focus,
            short_break_minutes: short,
            long_break_minutes: long,
            long_break_interval: interval,
            ..Configuration::default()
        }
    }

    #[test]
    fn start_pause_start() {
        let (mut engine, _) = engine_with(Configuration::default());
        assert!(!engine.is_running());
        assert_eq!(engine.remaining_secs(), 25 * 60);

        assert!(engine.start().is_some());
        assert!(engine.is_running());
        assert!(engine.start().is_none());

        engine.tick();
        assert!(engine.pause().is_some());
        assert!(engine.pause().is_none());
        assert_eq!(engine.remaining_secs(), 25 * 60 - 1);

        match engine.start() {
            Some(Event::PhaseStarted { resumed, .. }) => assert!(resumed),
            other => panic!("Expected PhaseStarted, got {other:?}"),
        }
    }

    #[test]
    fn tick_while_stopped_is_noop() {
        let (mut engine, sessions) = engine_with(minutes(1, 1, 1, 2));
        let before = engine.state().clone();
        for _ in 0..120 {
            assert!(engine.tick().is_none());
        }
        assert_eq!(engine.state(), &before);
        assert!(sessions.is_empty());
    }

    #[test]
    fn focus_expiry_moves_to_short_break() {
        let (mut engine, sessions) = engine_with(minutes(1, 2, 3, 2));
        engine.start();
        for _ in 0..59 {
            assert!(engine.tick().is_none());
        }
        match engine.tick() {
            Some(Event::PhaseCompleted {
                record,
                next_phase,
                auto_started,
                completed_focus_phases,
                ..
            }) => {
                assert_eq!(record.phase, Phase::Focus);
                assert!(record.completed);
                assert_eq!(record.duration_minutes, 1);
                assert_eq!(next_phase, Phase::ShortBreak);
                assert!(!auto_started);
                assert_eq!(completed_focus_phases, 1);
            }
            other => panic!("Expected PhaseCompleted, got {other:?}"),
        }
        assert_eq!(engine.phase(), Phase::ShortBreak);
        assert_eq!(engine.remaining_secs(), 120);
        assert!(!engine.is_running());
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn reset_restores_duration_and_keeps_counter() {
        let (mut engine, _) = engine_with(minutes(1, 1, 1, 2));
        engine.start();
        for _ in 0..60 {
            engine.tick();
        }
        engine.start();
        engine.tick();
        engine.reset();
        assert_eq!(engine.phase(), Phase::ShortBreak);
        assert_eq!(engine.remaining_secs(), 60);
        assert!(!engine.is_running());
        assert_eq!(engine.completed_focus_phases(), 1);
    }

    #[test]
    fn switch_pauses_and_keeps_counter() {
        let (mut engine, sessions) = engine_with(minutes(25, 5, 15, 4));
        engine.start();
        engine.tick();
        engine.switch_to(Phase::LongBreak);
        assert_eq!(engine.phase(), Phase::LongBreak);
        assert_eq!(engine.remaining_secs(), 15 * 60);
        assert!(!engine.is_running());
        assert_eq!(engine.completed_focus_phases(), 0);
        assert!(sessions.is_empty());
    }

    #[test]
    fn config_change_while_stopped_resizes() {
        let (mut engine, _) = engine_with(Configuration::default());
        engine
            .set_configuration(minutes(40, 5, 15, 4))
            .unwrap();
        assert_eq!(engine.remaining_secs(), 40 * 60);
        assert_eq!(engine.total_secs(), 40 * 60);
    }

    #[test]
    fn config_change_while_paused_resizes_and_drops_elapsed() {
        let (mut engine, sessions) = engine_with(minutes(25, 5, 15, 4));
        engine.start();
        for _ in 0..90 {
            engine.tick();
        }
        engine.pause();
        assert_eq!(engine.remaining_secs(), 25 * 60 - 90);

        match engine.set_configuration(minutes(30, 5, 15, 4)).unwrap() {
            Event::ConfigurationChanged { resized, .. } => assert!(resized),
            other => panic!("Expected ConfigurationChanged, got {other:?}"),
        }
        assert_eq!(engine.phase(), Phase::Focus);
        assert_eq!(engine.remaining_secs(), 30 * 60);
        assert_eq!(engine.total_secs(), 30 * 60);
        assert!(!engine.is_running());

        assert!(engine.stop_and_commit().is_none());
        assert!(sessions.is_empty());
    }

    #[test]
    fn config_change_while_running_applies_next_phase() {
        let (mut engine, sessions) = engine_with(minutes(1, 5, 15, 4));
        engine.start();
        engine.tick();
        match engine.set_configuration(minutes(10, 2, 15, 4)).unwrap() {
            Event::ConfigurationChanged { resized, .. } => assert!(!resized),
            other => panic!("Expected ConfigurationChanged, got {other:?}"),
        }
        assert_eq!(engine.remaining_secs(), 59);
        assert_eq!(engine.total_secs(), 60);

        for _ in 0..59 {
            engine.tick();
        }
        assert_eq!(engine.phase(), Phase::ShortBreak);
        assert_eq!(engine.remaining_secs(), 2 * 60);
        assert_eq!(sessions.records()[0].duration_minutes, 1);
    }

    #[test]
    fn rejected_config_leaves_countdown_untouched() {
        let (mut engine, _) = engine_with(minutes(1, 1, 1, 2));
        engine.start();
        engine.tick();
        let before = engine.state().clone();
        let err = engine.set_configuration(minutes(1, 1, 1, 1)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfiguration { .. }));
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.configuration().long_break_interval, 2);
    }

    #[test]
    fn stop_and_commit_records_incomplete_session() {
        let (mut engine, sessions) = engine_with(minutes(25, 5, 15, 4));
        engine.associate_task(Some(TaskRef::new("task-7")));
        assert!(engine.stop_and_commit().is_none());

        engine.start();
        for _ in 0..150 {
            engine.tick();
        }
        match engine.stop_and_commit() {
            Some(Event::SessionCommitted { record, persisted, .. }) => {
                assert!(persisted);
                assert!(!record.completed);
                assert_eq!(record.duration_minutes, 2);
                assert_eq!(record.task_ref, Some(TaskRef::new("task-7")));
            }
            other => panic!("Expected SessionCommitted, got {other:?}"),
        }
        assert_eq!(engine.remaining_secs(), 25 * 60);
        assert!(!engine.is_running());
        assert_eq!(engine.completed_focus_phases(), 0);
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let (engine, _) = engine_with(Configuration::default());
        match engine.snapshot() {
            Event::StateSnapshot {
                state,
                total_secs,
                progress_pct,
                ..
            } => {
                assert_eq!(state.phase, Phase::Focus);
                assert!(!state.running);
                assert_eq!(state.remaining_secs, 25 * 60);
                assert_eq!(total_secs, 25 * 60);
                assert_eq!(progress_pct, 0.0);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn observers_see_emitted_events() {
        let (mut engine, _) = engine_with(minutes(1, 1, 1, 2));
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(move |event: &Event| sink.borrow_mut().push(event.name()));
        engine.start();
        for _ in 0..60 {
            engine.tick();
        }
        assert_eq!(*seen.borrow(), vec!["phase_started", "phase_completed"]);
    }
}
