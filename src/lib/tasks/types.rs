use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    #[default]
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle record for one workload.
///
/// Submitted snapshots carry the requested state; the copy held by the
/// worker's store carries the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: Uuid,
    pub container_id: Option<String>,
    pub name: String,
    pub state: State,
    pub image: String,
    pub memory: u64,
    pub disk: u64,
    pub env: Vec<String>,
    pub restart_policy: String,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl Default for Task {
    fn default() -> Self {
        Task {
            id: Uuid::new_v4(),
            container_id: None,
            name: String::new(),
            state: State::Pending,
            image: String::new(),
            memory: 0,
            disk: 0,
            env: Vec::new(),
            restart_policy: String::new(),
            start_time: None,
            finish_time: None,
        }
    }
}

impl Task {
    pub fn new(name: &str, image: &str, state: State) -> Self {
        Task {
            name: name.to_string(),
            image: image.to_string(),
            state,
            ..Default::default()
        }
    }
}

/// Container settings derived from a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub name: String,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub cmd: Vec<String>,
    pub image: String,
    pub memory: i64,
    pub disk: i64,
    pub env: Vec<String>,
    pub restart_policy: String,
}

pub fn new_config(task: &Task) -> Config {
    Config {
        name: task.name.clone(),
        image: task.image.clone(),
        memory: i64::try_from(task.memory).unwrap_or(i64::MAX),
        disk: i64::try_from(task.disk).unwrap_or(i64::MAX),
        env: task.env.clone(),
        restart_policy: task.restart_policy.clone(),
        ..Default::default()
    }
}

/// Resource limits and host options applied when a container is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSettings {
    pub memory: i64,
    pub restart_policy: String,
    pub publish_all_ports: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Stdout(String),
    Stderr(String),
}

/// Outcome of one adapter call. `error` is set on failure; the other fields
/// are diagnostic.
#[derive(Debug, Default)]
pub struct DockerResult {
    pub error: Option<TaskError>,
    pub action: Option<String>,
    pub container_id: Option<String>,
    pub result: Option<String>,
    pub output: Vec<LogLine>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("unknown restart policy '{0}'")]
    InvalidRestartPolicy(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to pull image {image}: {source}")]
    ImagePull { image: String, source: RuntimeError },

    #[error("failed to create container {name}: {source}")]
    CreateContainer { name: String, source: RuntimeError },

    #[error("failed to start container {container_id}: {source}")]
    StartContainer {
        container_id: String,
        source: RuntimeError,
    },

    #[error("failed to attach to logs of container {container_id}: {source}")]
    AttachLogs {
        container_id: String,
        source: RuntimeError,
    },

    #[error("failed to stop container {container_id}: {source}")]
    StopContainer {
        container_id: String,
        source: RuntimeError,
    },

    #[error("failed to remove container {container_id}: {source}")]
    RemoveContainer {
        container_id: String,
        source: RuntimeError,
    },

    #[error("no container recorded for task {0}")]
    MissingContainer(Uuid),

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: State, to: State },

    #[error("no handler for requested state {0}")]
    UnhandledState(State),
}
