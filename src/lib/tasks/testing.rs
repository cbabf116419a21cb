//! In-process runtime for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use super::runtime::ContainerRuntime;
use super::types::{Config, HostSettings, LogLine, RuntimeError};

/// Records every call as `"<stage> <argument>"` and fails the configured
/// stage (`pull`, `create`, `start`, `logs`, `stop`, `remove`).
#[derive(Debug, Default)]
pub struct FakeRuntime {
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<&'static str>>,
    created: AtomicUsize,
    created_with: Mutex<Vec<(Config, HostSettings)>>,
    logs: Vec<LogLine>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(stage: &'static str) -> Self {
        let runtime = Self::default();
        runtime.fail_on(Some(stage));
        runtime
    }

    pub fn with_logs(logs: Vec<LogLine>) -> Self {
        FakeRuntime {
            logs,
            ..Self::default()
        }
    }

    pub fn fail_on(&self, stage: Option<&'static str>) {
        *self.fail_on.lock().unwrap() = stage;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Settings passed to each `create_container` call, in order.
    pub fn created_with(&self) -> Vec<(Config, HostSettings)> {
        self.created_with.lock().unwrap().clone()
    }

    fn record(&self, stage: &'static str, arg: &str) -> Result<(), RuntimeError> {
        self.calls.lock().unwrap().push(format!("{stage} {arg}"));
        if *self.fail_on.lock().unwrap() == Some(stage) {
            return Err(RuntimeError::Other(format!("{stage} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn pull_image(&self, image: &str) -> BoxStream<'_, Result<String, RuntimeError>> {
        let status = self
            .record("pull", image)
            .map(|()| format!("Status: Downloaded newer image for {image}"));
        stream::iter(vec![Ok("Pulling fs layer".to_string()), status]).boxed()
    }

    async fn create_container(
        &self,
        name: &str,
        config: &Config,
        host: &HostSettings,
    ) -> Result<String, RuntimeError> {
        self.created_with
            .lock()
            .unwrap()
            .push((config.clone(), host.clone()));
        self.record("create", name)?;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("container-{n}"))
    }

    async fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record("start", container_id)
    }

    fn stream_logs(&self, container_id: &str) -> BoxStream<'_, Result<LogLine, RuntimeError>> {
        match self.record("logs", container_id) {
            Ok(()) => stream::iter(self.logs.clone().into_iter().map(Ok)).boxed(),
            Err(err) => stream::iter(vec![Err(err)]).boxed(),
        }
    }

    async fn stop_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record("stop", container_id)
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.record("remove", container_id)
    }
}
