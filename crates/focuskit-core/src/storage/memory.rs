//! In-memory stores for hosts without a database and for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use super::config::KeyValueStore;
use super::database::{SessionRecord, SessionSink};
use crate::error::PersistenceError;

/// Key-value store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Session sink that keeps every record in order of arrival.
#[derive(Debug, Default)]
pub struct MemorySessions {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionSink for MemorySessions {
    fn record_session(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}
