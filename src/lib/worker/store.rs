//! Authoritative task records, keyed by task id.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::lib::tasks::types::Task;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task store backend failure: {0}")]
    Backend(String),
}

impl From<String> for StoreError {
    fn from(msg: String) -> Self {
        StoreError::Backend(msg)
    }
}

/// Holds exactly one current record per task. Records are overwritten, never
/// deleted.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: &Uuid) -> StoreResult<Option<Task>>;

    /// Inserts or overwrites the record for `task.id`.
    async fn put(&mut self, task: Task) -> StoreResult<()>;

    async fn list(&self) -> StoreResult<Vec<Task>>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: HashMap<Uuid, Task>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: &Uuid) -> StoreResult<Option<Task>> {
        Ok(self.tasks.get(id).cloned())
    }

    async fn put(&mut self, task: Task) -> StoreResult<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Task>> {
        Ok(self.tasks.values().cloned().collect())
    }
}
