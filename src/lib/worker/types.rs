use std::{collections::VecDeque, sync::Arc};

use thiserror::Error;
use uuid::Uuid;

use super::store::{StoreError, TaskStore};
use crate::lib::tasks::{
    runtime::ContainerRuntime,
    types::{Task, TaskError},
};

pub struct Worker {
    pub name: String,
    pub queue: VecDeque<Task>,
    pub db: Box<dyn TaskStore>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub stop_failure_policy: StopFailurePolicy,
}

/// What the worker records when stopping a task's container fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StopFailurePolicy {
    /// Mark the task Completed anyway and report the error in the result.
    #[default]
    Complete,
    /// Mark the task Failed and report the error in the result.
    Fail,
    /// Leave the record untouched and return the error from `run_task`.
    Abort,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stop aborted for task {task_id}: {source}")]
    StopAborted { task_id: Uuid, source: TaskError },

    #[error("worker {0} is no longer running")]
    Closed(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
