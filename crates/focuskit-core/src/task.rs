//! Work items a session can be associated with.
//!
//! The engine only carries a [`TaskRef`]; it never checks that the task
//! exists. Lookup belongs to a [`TaskDirectory`].

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::storage::Database;

/// Opaque external task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(String);

impl TaskRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskRef,
    pub title: String,
}

/// Read-only source of association candidates.
pub trait TaskDirectory {
    fn tasks(&self) -> Result<Vec<TaskSummary>, PersistenceError>;

    fn find(&self, id: &TaskRef) -> Result<Option<TaskSummary>, PersistenceError> {
        Ok(self.tasks()?.into_iter().find(|t| &t.id == id))
    }
}

impl TaskDirectory for Vec<TaskSummary> {
    fn tasks(&self) -> Result<Vec<TaskSummary>, PersistenceError> {
        Ok(self.clone())
    }
}

impl Database {
    /// Add a task candidate with a fresh id.
    pub fn add_task(&self, title: &str) -> Result<TaskSummary, rusqlite::Error> {
        let task = TaskSummary {
            id: TaskRef::new(uuid::Uuid::new_v4().to_string()),
            title: title.to_string(),
        };
        self.conn().execute(
            "INSERT INTO tasks (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![task.id.as_str(), task.title, Utc::now().to_rfc3339()],
        )?;
        Ok(task)
    }

    /// Tasks in creation order.
    pub fn list_tasks(&self) -> Result<Vec<TaskSummary>, rusqlite::Error> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, title FROM tasks ORDER BY created_at, rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(TaskSummary {
                id: TaskRef::new(row.get::<_, String>(0)?),
                title: row.get(1)?,
            })
        })?;
        rows.collect()
    }
}

impl TaskDirectory for Database {
    fn tasks(&self) -> Result<Vec<TaskSummary>, PersistenceError> {
        Ok(self.list_tasks()?)
    }

    fn find(&self, id: &TaskRef) -> Result<Option<TaskSummary>, PersistenceError> {
        let result = self.conn().query_row(
            "SELECT id, title FROM tasks WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(TaskSummary {
                    id: TaskRef::new(row.get::<_, String>(0)?),
                    title: row.get(1)?,
                })
            },
        );
        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
