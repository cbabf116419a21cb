use std::{collections::VecDeque, sync::Arc};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::{
    store::InMemoryTaskStore,
    types::{StopFailurePolicy, Worker, WorkerError, WorkerResult},
};
use crate::lib::tasks::{
    docker::DockerClient,
    runtime::ContainerRuntime,
    state::{Action, valid_state_transition},
    types::{DockerResult, State, Task, TaskError, new_config},
};

impl Worker {
    pub fn new(name: &str, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Worker {
            name: name.to_string(),
            queue: VecDeque::new(),
            db: Box::new(InMemoryTaskStore::new()),
            runtime,
            stop_failure_policy: StopFailurePolicy::default(),
        }
    }

    pub fn with_stop_failure_policy(mut self, policy: StopFailurePolicy) -> Self {
        self.stop_failure_policy = policy;
        self
    }

    /// Queues a snapshot carrying the requested state. Nothing is checked
    /// until it is processed.
    pub fn add_task(&mut self, task: Task) {
        debug!(worker = %self.name, task_id = %task.id, state = %task.state, "task queued");
        self.queue.push_back(task);
    }

    /// Processes the oldest queued snapshot to completion.
    ///
    /// The first snapshot seen for an id becomes its stored record before the
    /// transition is checked, so the check runs against the snapshot's own
    /// state. An empty queue yields an empty, error-free result.
    pub async fn run_task(&mut self) -> WorkerResult<DockerResult> {
        let Some(task_queued) = self.queue.pop_front() else {
            debug!(worker = %self.name, "no tasks in queue");
            return Ok(DockerResult::empty());
        };

        let task_persisted = match self.db.get(&task_queued.id).await? {
            Some(task) => task,
            None => {
                debug!(task_id = %task_queued.id, "first sighting of task");
                self.db.put(task_queued.clone()).await?;
                task_queued.clone()
            }
        };

        if !valid_state_transition(task_persisted.state, task_queued.state) {
            warn!(
                task_id = %task_queued.id,
                from = %task_persisted.state,
                to = %task_queued.state,
                "invalid state transition"
            );
            return Ok(DockerResult::with_error(TaskError::InvalidTransition {
                from: task_persisted.state,
                to: task_queued.state,
            }));
        }

        match Action::for_state(task_queued.state) {
            Some(Action::Start) => {
                info!(task_id = %task_queued.id, "task is scheduled, starting it");
                self.start_task(task_queued).await
            }
            Some(Action::Stop) => {
                info!(task_id = %task_queued.id, "task is completed, stopping it");
                self.stop_task(task_queued, task_persisted).await
            }
            None => {
                error!(
                    task_id = %task_queued.id,
                    state = %task_queued.state,
                    "no handler for requested state"
                );
                Ok(DockerResult::with_error(TaskError::UnhandledState(
                    task_queued.state,
                )))
            }
        }
    }

    async fn start_task(&mut self, mut task: Task) -> WorkerResult<DockerResult> {
        // Only a container created by this run may be recorded.
        task.container_id = None;
        task.start_time = Some(Utc::now());
        let config = new_config(&task);
        let mut docker_client = DockerClient::new(self.runtime.clone(), config);

        let result = docker_client.run().await;
        match &result.error {
            Some(err) => {
                error!(task_id = %task.id, error = %err, "error running task");
                task.state = State::Failed;
            }
            None => {
                info!(
                    task_id = %task.id,
                    container_id = ?result.container_id,
                    "task started"
                );
                task.state = State::Running;
            }
        }

        // A failed start may still have created a container.
        if result.container_id.is_some() {
            task.container_id = result.container_id.clone();
        }
        self.db.put(task).await?;

        Ok(result)
    }

    async fn stop_task(&mut self, mut task: Task, persisted: Task) -> WorkerResult<DockerResult> {
        // The stored record wins; the snapshot may predate the start.
        task.container_id = persisted.container_id.or(task.container_id);
        task.start_time = persisted.start_time.or(task.start_time);

        let config = new_config(&task);
        let docker_client = DockerClient::new(self.runtime.clone(), config);

        let stopped = match task.container_id.as_deref() {
            Some(container_id) => docker_client.stop(container_id).await,
            None => Err(TaskError::MissingContainer(task.id)),
        };

        let (state, result) = match stopped {
            Ok(result) => {
                info!(task_id = %task.id, container_id = ?result.container_id, "task stopped");
                (State::Completed, result)
            }
            Err(err) => {
                error!(
                    task_id = %task.id,
                    error = %err,
                    policy = ?self.stop_failure_policy,
                    "error stopping task"
                );
                match self.stop_failure_policy {
                    StopFailurePolicy::Complete => (State::Completed, DockerResult::with_error(err)),
                    StopFailurePolicy::Fail => (State::Failed, DockerResult::with_error(err)),
                    StopFailurePolicy::Abort => {
                        return Err(WorkerError::StopAborted {
                            task_id: task.id,
                            source: err,
                        });
                    }
                }
            }
        };

        task.finish_time = Some(Utc::now());
        task.state = state;
        self.db.put(task).await?;

        Ok(result)
    }

    pub async fn get_tasks(&self) -> WorkerResult<Vec<Task>> {
        Ok(self.db.list().await?)
    }
}
