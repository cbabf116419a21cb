//! Message-passing front for a worker.
//!
//! One tokio task owns the `Worker`; callers talk to it through a cloneable
//! `WorkerHandle`, so queue and store access never interleave.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};
use tracing::{debug, error, info};

use super::types::{Worker, WorkerError, WorkerResult};
use crate::lib::tasks::types::{DockerResult, Task};

const COMMAND_BUFFER: usize = 64;

enum Command {
    Submit(Task),
    ProcessNext(oneshot::Sender<WorkerResult<DockerResult>>),
    Tasks(oneshot::Sender<WorkerResult<Vec<Task>>>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct WorkerHandle {
    name: String,
    sender: mpsc::Sender<Command>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn add_task(&self, task: Task) -> WorkerResult<()> {
        self.send(Command::Submit(task)).await
    }

    pub async fn run_task(&self) -> WorkerResult<DockerResult> {
        let (reply, response) = oneshot::channel();
        self.send(Command::ProcessNext(reply)).await?;
        response.await.map_err(|_| self.closed())?
    }

    pub async fn get_tasks(&self) -> WorkerResult<Vec<Task>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Tasks(reply)).await?;
        response.await.map_err(|_| self.closed())?
    }

    /// Asks the worker loop to exit once the commands ahead of this one
    /// are handled.
    pub async fn shutdown(&self) -> WorkerResult<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> WorkerResult<()> {
        self.sender.send(command).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> WorkerError {
        WorkerError::Closed(self.name.clone())
    }
}

/// Moves `worker` onto its own task. With a `poll_interval` the loop also
/// processes one queued submission per tick.
pub fn spawn(worker: Worker, poll_interval: Option<Duration>) -> (WorkerHandle, JoinHandle<()>) {
    let (sender, commands) = mpsc::channel(COMMAND_BUFFER);
    let handle = WorkerHandle {
        name: worker.name.clone(),
        sender,
    };

    let ticker = poll_interval.map(|period| {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let join = tokio::spawn(run_tasks(worker, commands, ticker));
    (handle, join)
}

async fn run_tasks(
    mut worker: Worker,
    mut commands: mpsc::Receiver<Command>,
    mut ticker: Option<Interval>,
) {
    info!(worker = %worker.name, "worker loop started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Submit(task)) => worker.add_task(task),
                Some(Command::ProcessNext(reply)) => {
                    let result = worker.run_task().await;
                    // The caller may have stopped waiting; keep the outcome in the log.
                    if let Err(result) = reply.send(result) {
                        log_result(&worker.name, &result);
                    }
                }
                Some(Command::Tasks(reply)) => {
                    if reply.send(worker.get_tasks().await).is_err() {
                        debug!(worker = %worker.name, "task listing dropped, caller went away");
                    }
                }
                Some(Command::Shutdown) | None => break,
            },
            () = next_tick(&mut ticker) => {
                if worker.queue.is_empty() {
                    debug!(worker = %worker.name, "no tasks in queue, waiting");
                    continue;
                }
                let result = worker.run_task().await;
                log_result(&worker.name, &result);
            }
        }
    }

    info!(worker = %worker.name, pending = worker.queue.len(), "worker loop stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn log_result(worker: &str, result: &WorkerResult<DockerResult>) {
    match result {
        Ok(result) => match &result.error {
            Some(err) => error!(worker, error = %err, "task processing failed"),
            None => info!(
                worker,
                action = ?result.action,
                container_id = ?result.container_id,
                "task processed"
            ),
        },
        Err(err) => error!(worker, error = %err, "worker error"),
    }
}
