//! # focuskit Core Library
//!
//! This library provides the focus-session engine behind the focuskit
//! Pomodoro timer. The `focuskit` CLI is a thin host over it: it owns the
//! one-second tick source and wires in SQLite storage and desktop effects.
//!
//! ## Architecture
//!
//! - **Session Engine**: a tick-driven state machine over
//!   Focus / ShortBreak / LongBreak phases; the caller invokes `tick()` at 1 Hz
//! - **Configuration Store**: validated timer settings persisted in a
//!   key-value store
//! - **Completion Effects**: session persistence, audio cue and system
//!   notification, each failing independently
//! - **Storage**: SQLite-based session history, statistics and settings
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: Core timer state machine
//! - [`ConfigStore`]: Settings load/validate/save
//! - [`CompletionAdapter`]: Best-effort completion side effects
//! - [`Database`]: Session and statistics persistence

pub mod effects;
pub mod error;
pub mod events;
pub mod storage;
pub mod task;
pub mod timer;

pub use effects::{AudioCue, CompletionAdapter, CompletionReport, Notifier, Permission};
pub use error::{ConfigError, CoreError, PersistenceError, SideEffectError};
pub use events::{Event, SessionObserver};
pub use storage::{ConfigStore, Configuration, Database, SessionRecord, SessionSink, Stats};
pub use task::{TaskDirectory, TaskRef, TaskSummary};
pub use timer::{EngineState, Phase, SessionEngine};
