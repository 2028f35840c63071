//! End-to-end scenarios for the session engine with in-memory collaborators.
//!
//! Every test drives the engine by calling `tick()` directly, one call per
//! simulated second.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use focuskit_core::effects::{EffectKind, EffectStatus};
use focuskit_core::storage::{MemorySessions, MemoryStore};
use focuskit_core::{
    AudioCue, CompletionAdapter, ConfigError, ConfigStore, Configuration, Event, Notifier,
    PersistenceError, Permission, Phase, SessionEngine, SessionRecord, SessionSink,
    SideEffectError, TaskRef,
};

fn config(focus: u32, short: u32, long: u32, interval: u32) -> Configuration {
    Configuration {
        focus_minutes: focus,
        short_break_minutes: short,
        long_break_minutes: long,
        long_break_interval: interval,
        ..Configuration::default()
    }
}

fn settings(cfg: Configuration) -> ConfigStore {
    let mut store = ConfigStore::open(MemoryStore::new());
    store.save(cfg).unwrap();
    store
}

fn engine(cfg: Configuration) -> (SessionEngine, Rc<MemorySessions>) {
    let sessions = Rc::new(MemorySessions::new());
    let engine = SessionEngine::new(settings(cfg), CompletionAdapter::new(Rc::clone(&sessions)));
    (engine, sessions)
}

/// Tick until the current phase completes, returning the completion event.
fn run_phase(engine: &mut SessionEngine) -> Event {
    engine.start();
    let max = engine.remaining_secs();
    for _ in 0..max {
        if let Some(event) = engine.tick() {
            return event;
        }
    }
    panic!("phase did not complete within {max} ticks");
}

struct FailingNotifier {
    attempts: Rc<Cell<usize>>,
}

impl Notifier for FailingNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, _title: &str, _body: &str) -> Result<(), SideEffectError> {
        self.attempts.set(self.attempts.get() + 1);
        Err(SideEffectError::Failed("notification service crashed".into()))
    }
}

struct DenyingNotifier;

impl Notifier for DenyingNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn notify(&self, _title: &str, _body: &str) -> Result<(), SideEffectError> {
        panic!("notify must not be called without permission");
    }
}

struct CountingCue {
    plays: Rc<Cell<usize>>,
}

impl AudioCue for CountingCue {
    fn play_cue(&self) -> Result<(), SideEffectError> {
        self.plays.set(self.plays.get() + 1);
        Ok(())
    }
}

struct FailingSink {
    attempts: Rc<RefCell<Vec<SessionRecord>>>,
}

impl SessionSink for FailingSink {
    fn record_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        self.attempts.borrow_mut().push(record.clone());
        Err(PersistenceError::Locked)
    }
}

#[test]
fn scenario_a_first_focus_leads_to_short_break() {
    let (mut engine, _) = engine(config(1, 1, 1, 2));
    engine.start();
    for _ in 0..60 {
        engine.tick();
    }
    assert_eq!(engine.phase(), Phase::ShortBreak);
    assert_eq!(engine.completed_focus_phases(), 1);
}

#[test]
fn scenario_b_second_focus_leads_to_long_break() {
    let (mut engine, _) = engine(config(1, 1, 1, 2));
    run_phase(&mut engine);
    assert_eq!(engine.phase(), Phase::ShortBreak);
    run_phase(&mut engine);
    assert_eq!(engine.phase(), Phase::Focus);
    run_phase(&mut engine);
    assert_eq!(engine.phase(), Phase::LongBreak);
    assert_eq!(engine.completed_focus_phases(), 2);
}

#[test]
fn scenario_c_auto_start_breaks_controls_running() {
    let (mut engine, _) = engine(config(1, 1, 1, 2));
    run_phase(&mut engine);
    assert!(!engine.is_running());

    let (mut engine, _) = crate::engine(Configuration {
        auto_start_breaks: true,
        ..config(1, 1, 1, 2)
    });
    match run_phase(&mut engine) {
        Event::PhaseCompleted { auto_started, .. } => assert!(auto_started),
        other => panic!("Expected PhaseCompleted, got {other:?}"),
    }
    assert!(engine.is_running());
    assert_eq!(engine.phase(), Phase::ShortBreak);

    // The break counts down on the next tick without another start().
    engine.tick();
    assert_eq!(engine.remaining_secs(), 59);
}

#[test]
fn auto_start_focus_resumes_after_break() {
    let (mut engine, _) = engine(Configuration {
        auto_start_focus: true,
        ..config(1, 1, 1, 2)
    });
    run_phase(&mut engine);
    assert!(!engine.is_running());
    run_phase(&mut engine);
    assert_eq!(engine.phase(), Phase::Focus);
    assert!(engine.is_running());
}

#[test]
fn scenario_d_zero_focus_is_rejected() {
    let (mut engine, _) = engine(config(2, 1, 1, 2));
    let err = engine.set_configuration(config(0, 1, 1, 2)).unwrap_err();
    match err {
        ConfigError::InvalidConfiguration { field, .. } => assert_eq!(field, "focusMinutes"),
        other => panic!("Expected InvalidConfiguration, got {other:?}"),
    }
    assert_eq!(engine.configuration(), &config(2, 1, 1, 2));
    assert_eq!(engine.settings().load(), config(2, 1, 1, 2));
    assert_eq!(engine.remaining_secs(), 120);
}

#[test]
fn scenario_e_failing_notification_still_records_and_advances() {
    let sessions = Rc::new(MemorySessions::new());
    let attempts = Rc::new(Cell::new(0));
    let adapter = CompletionAdapter::new(Rc::clone(&sessions)).with_notifier(FailingNotifier {
        attempts: Rc::clone(&attempts),
    });
    let mut engine = SessionEngine::new(settings(config(1, 1, 1, 2)), adapter);

    match run_phase(&mut engine) {
        Event::PhaseCompleted { report, .. } => {
            assert!(report.succeeded(EffectKind::Persist));
            assert!(matches!(
                report.status(EffectKind::Notification),
                Some(EffectStatus::Failed { .. })
            ));
        }
        other => panic!("Expected PhaseCompleted, got {other:?}"),
    }
    assert_eq!(attempts.get(), 1);
    assert_eq!(sessions.len(), 1);
    assert_eq!(engine.phase(), Phase::ShortBreak);
}

#[test]
fn scenario_e_denied_permission_still_records_and_advances() {
    let sessions = Rc::new(MemorySessions::new());
    let adapter = CompletionAdapter::new(Rc::clone(&sessions)).with_notifier(DenyingNotifier);
    let mut engine = SessionEngine::new(settings(config(1, 1, 1, 2)), adapter);

    run_phase(&mut engine);
    assert_eq!(sessions.len(), 1);
    assert_eq!(engine.phase(), Phase::ShortBreak);
}

#[test]
fn persistence_failure_does_not_change_engine_state() {
    let attempts = Rc::new(RefCell::new(Vec::new()));
    let adapter = CompletionAdapter::new(FailingSink {
        attempts: Rc::clone(&attempts),
    });
    let mut engine = SessionEngine::new(settings(config(1, 1, 1, 2)), adapter);

    match run_phase(&mut engine) {
        Event::PhaseCompleted { report, .. } => {
            assert!(matches!(
                report.status(EffectKind::Persist),
                Some(EffectStatus::Failed { .. })
            ));
        }
        other => panic!("Expected PhaseCompleted, got {other:?}"),
    }
    assert_eq!(attempts.borrow().len(), 1);
    assert_eq!(engine.phase(), Phase::ShortBreak);
    assert_eq!(engine.completed_focus_phases(), 1);
}

#[test]
fn one_record_per_expiry_across_cycles() {
    let plays = Rc::new(Cell::new(0));
    let sessions = Rc::new(MemorySessions::new());
    let adapter = CompletionAdapter::new(Rc::clone(&sessions)).with_audio(CountingCue {
        plays: Rc::clone(&plays),
    });
    let mut engine = SessionEngine::new(
        settings(Configuration {
            auto_start_breaks: true,
            auto_start_focus: true,
            ..config(1, 1, 2, 3)
        }),
        adapter,
    );

    engine.start();
    let mut completions = 0;
    // 6 focus phases, 4 short breaks, 2 long breaks: 6 + 4 + 4 minutes.
    for _ in 0..(14 * 60) {
        if let Some(Event::PhaseCompleted { .. }) = engine.tick() {
            completions += 1;
        }
    }

    let records = sessions.records();
    assert_eq!(completions, 12);
    assert_eq!(records.len(), 12);
    assert_eq!(plays.get(), 12);
    assert_eq!(engine.completed_focus_phases(), 6);

    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 12);

    let phases: Vec<Phase> = records.iter().map(|r| r.phase).collect();
    assert_eq!(&phases[..6], &[
        Phase::Focus,
        Phase::ShortBreak,
        Phase::Focus,
        Phase::ShortBreak,
        Phase::Focus,
        Phase::LongBreak,
    ]);
    assert!(records.iter().all(|r| r.completed));
}

#[test]
fn unresolved_task_reference_is_recorded() {
    let (mut engine, sessions) = engine(config(1, 1, 1, 2));
    engine.associate_task(Some(TaskRef::new("does-not-exist")));
    run_phase(&mut engine);
    assert_eq!(
        sessions.records()[0].task_ref,
        Some(TaskRef::new("does-not-exist"))
    );
}

#[test]
fn abandoned_pause_does_not_count() {
    let (mut engine, sessions) = engine(config(1, 1, 1, 2));
    engine.start();
    for _ in 0..59 {
        engine.tick();
    }
    engine.pause();
    engine.switch_to(Phase::Focus);
    assert_eq!(engine.completed_focus_phases(), 0);
    assert_eq!(engine.remaining_secs(), 60);
    assert!(sessions.is_empty());
}
