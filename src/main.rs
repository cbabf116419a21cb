use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::lib::{
    tasks::{
        runtime::BollardRuntime,
        types::{State, Task},
    },
    worker::{
        api,
        types::{StopFailurePolicy, Worker},
    },
};

mod lib {
    pub mod tasks;
    pub mod worker;
}

/// Runs one container task through its lifecycle on the local Docker daemon.
#[derive(Debug, Parser)]
#[command(name = "cube-worker", version)]
struct Cli {
    #[arg(long, env = "CUBE_WORKER_NAME", default_value = "default_worker")]
    worker_name: String,

    /// JSON task snapshot; overrides the task flags below.
    #[arg(long, env = "CUBE_TASK_FILE")]
    task_file: Option<PathBuf>,

    #[arg(long, default_value = "test-container-1")]
    name: String,

    #[arg(long, default_value = "strm/helloworld-http")]
    image: String,

    /// Memory limit in bytes, 0 for none.
    #[arg(long, default_value_t = 0)]
    memory: u64,

    #[arg(long, default_value = "")]
    restart_policy: String,

    /// KEY=VALUE, repeatable.
    #[arg(long = "env")]
    env: Vec<String>,

    /// How long the container runs before it is stopped.
    #[arg(long, env = "CUBE_STOP_AFTER_SECS", default_value_t = 30)]
    stop_after_secs: u64,

    #[arg(long, env = "CUBE_STOP_FAILURE_POLICY", value_enum, default_value_t = StopFailurePolicy::Complete)]
    stop_failure_policy: StopFailurePolicy,
}

impl Cli {
    fn task(&self) -> Result<Task, Box<dyn Error>> {
        let mut task = match &self.task_file {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => Task {
                memory: self.memory,
                env: self.env.clone(),
                restart_policy: self.restart_policy.clone(),
                ..Task::new(&self.name, &self.image, State::Scheduled)
            },
        };
        task.state = State::Scheduled;
        Ok(task)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let runtime = BollardRuntime::connect()?;
    runtime.ping().await?;

    let worker = Worker::new(&cli.worker_name, Arc::new(runtime))
        .with_stop_failure_policy(cli.stop_failure_policy);
    let (worker, worker_loop) = api::spawn(worker, None);

    let mut task = cli.task()?;

    // First time the worker sees the task.
    info!(worker = worker.name(), task_id = %task.id, "starting task");
    worker.add_task(task.clone()).await?;
    let result = worker.run_task().await?;
    if let Some(err) = result.error {
        return Err(err.into());
    }
    info!(
        task_id = %task.id,
        action = ?result.action,
        result = ?result.result,
        output_lines = result.output.len(),
        "task running"
    );
    task.container_id = result.container_id;

    tokio::time::sleep(Duration::from_secs(cli.stop_after_secs)).await;

    info!(worker = worker.name(), task_id = %task.id, "stopping task");
    task.state = State::Completed;
    worker.add_task(task).await?;
    let result = worker.run_task().await?;
    if let Some(err) = result.error {
        return Err(err.into());
    }

    for task in worker.get_tasks().await? {
        info!(task_id = %task.id, state = %task.state, container_id = ?task.container_id, "task record");
    }

    worker.shutdown().await?;
    worker_loop.await?;

    Ok(())
}
