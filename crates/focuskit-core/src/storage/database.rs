//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Finished and committed focus-session records
//! - Session statistics (daily and all-time)
//! - Key-value store for settings
//! - Task candidates for session association

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::config::KeyValueStore;
use super::data_dir;
use crate::error::PersistenceError;
use crate::task::TaskRef;
use crate::timer::Phase;

/// One finished (or explicitly committed) phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    #[serde(default)]
    pub task_ref: Option<TaskRef>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub phase: Phase,
    /// `true` when the countdown reached zero, `false` for a stop-with-commit.
    pub completed: bool,
}

/// Receives session records emitted by the engine.
pub trait SessionSink {
    fn record_session(&self, record: &SessionRecord) -> Result<(), PersistenceError>;
}

impl<T: SessionSink + ?Sized> SessionSink for Arc<T> {
    fn record_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        (**self).record_session(record)
    }
}

impl<T: SessionSink + ?Sized> SessionSink for Rc<T> {
    fn record_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        (**self).record_session(record)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub completed_pomodoros: u64,
    pub long_breaks: u64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/focuskit.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> crate::error::Result<Self> {
        let path = data_dir()?.join("focuskit.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path).map_err(|source| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id           TEXT PRIMARY KEY,
                task_ref     TEXT,
                phase        TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                started_at   TEXT NOT NULL,
                ended_at     TEXT NOT NULL,
                completed    INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Create indexes for common query patterns
            CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON sessions(ended_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_phase ON sessions(phase);
            CREATE INDEX IF NOT EXISTS idx_sessions_ended_at_phase ON sessions(ended_at, phase);",
        )?;
        Ok(())
    }

    /// Insert a session record.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including a duplicate id).
    pub fn insert_session(&self, record: &SessionRecord) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions (id, task_ref, phase, duration_min, started_at, ended_at, completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.task_ref.as_ref().map(TaskRef::as_str),
                record.phase.as_str(),
                record.duration_minutes,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
                record.completed,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, rusqlite::Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, task_ref, phase, duration_min, started_at, ended_at, completed
             FROM sessions
             ORDER BY ended_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], session_from_row)?;
        rows.collect()
    }

    pub fn stats_today(&self) -> Result<Stats, rusqlite::Error> {
        let mut stats = self.aggregate(Some(&today_start()))?;
        stats.today_sessions = stats.completed_pomodoros;
        stats.today_focus_min = stats.total_focus_min;
        Ok(stats)
    }

    pub fn stats_all(&self) -> Result<Stats, rusqlite::Error> {
        let mut stats = self.aggregate(None)?;
        let today = self.aggregate(Some(&today_start()))?;
        stats.today_sessions = today.completed_pomodoros;
        stats.today_focus_min = today.total_focus_min;
        Ok(stats)
    }

    fn aggregate(&self, since: Option<&str>) -> Result<Stats, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT phase, completed, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE ?1 IS NULL OR ended_at >= ?1
             GROUP BY phase, completed",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;

        for row in rows {
            let (phase, completed, count, minutes) = row?;
            stats.total_sessions += count;
            match Phase::parse(&phase) {
                Some(Phase::Focus) => {
                    stats.total_focus_min += minutes;
                    if completed {
                        stats.completed_pomodoros += count;
                    }
                }
                Some(p @ (Phase::ShortBreak | Phase::LongBreak)) => {
                    stats.total_break_min += minutes;
                    if p == Phase::LongBreak && completed {
                        stats.long_breaks += count;
                    }
                }
                None => {}
            }
        }
        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionSink for Database {
    fn record_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        Ok(self.insert_session(record)?)
    }
}

impl KeyValueStore for Database {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.kv_get(key)?)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        Ok(self.kv_set(key, value)?)
    }
}

fn today_start() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn session_from_row(row: &Row<'_>) -> Result<SessionRecord, rusqlite::Error> {
    let phase_raw: String = row.get(2)?;
    let phase = Phase::parse(&phase_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown phase '{phase_raw}'").into(),
        )
    })?;
    let started_at: String = row.get(4)?;
    let ended_at: String = row.get(5)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        task_ref: row.get::<_, Option<String>>(1)?.map(TaskRef::new),
        phase,
        duration_minutes: row.get(3)?,
        started_at: parse_timestamp(4, &started_at)?,
        ended_at: parse_timestamp(5, &ended_at)?,
        completed: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(phase: Phase, minutes: u32, completed: bool) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            task_ref: None,
            started_at: now - chrono::Duration::minutes(i64::from(minutes)),
            ended_at: now,
            duration_minutes: minutes,
            phase,
            completed,
        }
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.record_session(&record(Phase::Focus, 25, true)).unwrap();
        db.record_session(&record(Phase::ShortBreak, 5, true)).unwrap();
        db.record_session(&record(Phase::Focus, 10, false)).unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.completed_pomodoros, 1);
        assert_eq!(stats.total_focus_min, 35);
        assert_eq!(stats.total_break_min, 5);
        assert_eq!(stats.today_sessions, 1);
    }

    #[test]
    fn recent_sessions_round_trip_fields() {
        let db = Database::open_memory().unwrap();
        let mut rec = record(Phase::LongBreak, 15, true);
        rec.task_ref = Some(TaskRef::new("task-42"));
        db.record_session(&rec).unwrap();

        let loaded = db.recent_sessions(10).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, rec.id);
        assert_eq!(loaded[0].phase, Phase::LongBreak);
        assert_eq!(loaded[0].task_ref, rec.task_ref);
        assert!(loaded[0].completed);
        assert_eq!(loaded[0].ended_at.timestamp(), rec.ended_at.timestamp());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let db = Database::open_memory().unwrap();
        let rec = record(Phase::Focus, 25, true);
        db.record_session(&rec).unwrap();
        assert!(db.record_session(&rec).is_err());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        assert_eq!(db.read("test").unwrap().as_deref(), Some("hello"));
    }
}
