use std::sync::Arc;

use futures_util::stream::StreamExt;
use tracing::{debug, error, info, warn};

use super::runtime::ContainerRuntime;
use super::state::Action;
use super::types::{Config, DockerResult, HostSettings, LogLine, TaskError};

impl DockerResult {
    /// Result of a call that had nothing to do.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_error(err: TaskError) -> Self {
        DockerResult {
            error: Some(err),
            ..Default::default()
        }
    }

    pub fn success(container_id: String, action: Action, result: &str) -> Self {
        DockerResult {
            container_id: Some(container_id),
            action: Some(action.as_str().to_string()),
            result: Some(result.to_string()),
            ..Default::default()
        }
    }
}

/// Drives one task's container through the runtime.
pub struct DockerClient {
    pub client: Arc<dyn ContainerRuntime>,
    pub config: Config,
    /// Set once `run` has created a container.
    pub container_id: Option<String>,
}

impl DockerClient {
    pub fn new(client: Arc<dyn ContainerRuntime>, config: Config) -> Self {
        DockerClient {
            client,
            config,
            container_id: None,
        }
    }

    /// Pulls the image, then creates and starts the container and reads its
    /// output. Failures come back in the result's `error`.
    pub async fn run(&mut self) -> DockerResult {
        info!(image = %self.config.image, "pulling image");

        {
            let mut stream = self.client.pull_image(&self.config.image);
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(status) => debug!(image = %self.config.image, %status, "pull progress"),
                    Err(source) => {
                        error!(image = %self.config.image, error = %source, "image pull failed");
                        return DockerResult::with_error(TaskError::ImagePull {
                            image: self.config.image.clone(),
                            source,
                        });
                    }
                }
            }
        }

        info!(image = %self.config.image, "image pulled");

        let host = HostSettings {
            memory: self.config.memory,
            restart_policy: self.config.restart_policy.clone(),
            publish_all_ports: true,
        };

        let container_id = match self
            .client
            .create_container(&self.config.name, &self.config, &host)
            .await
        {
            Ok(id) => {
                info!(container_id = %id, name = %self.config.name, "container created");
                id
            }
            Err(source) => {
                error!(name = %self.config.name, error = %source, "error creating container");
                return DockerResult::with_error(TaskError::CreateContainer {
                    name: self.config.name.clone(),
                    source,
                });
            }
        };
        self.container_id = Some(container_id.clone());

        if let Err(source) = self.client.start_container(&container_id).await {
            error!(container_id = %container_id, error = %source, "error starting container");
            return self.failed_after_create(TaskError::StartContainer {
                container_id: container_id.clone(),
                source,
            });
        }
        info!(container_id = %container_id, "container started");

        let output = match self.read_logs(&container_id).await {
            Ok(output) => output,
            Err(err) => return self.failed_after_create(err),
        };

        let mut result = DockerResult::success(container_id, Action::Start, "success");
        result.output = output;
        result
    }

    fn failed_after_create(&self, err: TaskError) -> DockerResult {
        DockerResult {
            container_id: self.container_id.clone(),
            ..DockerResult::with_error(err)
        }
    }

    async fn read_logs(&self, container_id: &str) -> Result<Vec<LogLine>, TaskError> {
        let mut logs = self.client.stream_logs(container_id);
        let mut output = Vec::new();

        while let Some(line) = logs.next().await {
            match line {
                Ok(line) => {
                    match &line {
                        LogLine::Stdout(text) => {
                            info!(container_id, stream = "stdout", "{}", text.trim_end())
                        }
                        LogLine::Stderr(text) => {
                            info!(container_id, stream = "stderr", "{}", text.trim_end())
                        }
                    }
                    output.push(line);
                }
                Err(source) if output.is_empty() => {
                    error!(container_id, error = %source, "error attaching to container logs");
                    return Err(TaskError::AttachLogs {
                        container_id: container_id.to_string(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(container_id, error = %err, "container log stream ended early");
                    break;
                }
            }
        }

        Ok(output)
    }

    /// Stops and removes `container_id`. An `Err` means the runtime refused
    /// and the container may still exist.
    pub async fn stop(&self, container_id: &str) -> Result<DockerResult, TaskError> {
        info!(container_id, "stopping container");

        self.client
            .stop_container(container_id)
            .await
            .map_err(|source| TaskError::StopContainer {
                container_id: container_id.to_string(),
                source,
            })?;

        self.client
            .remove_container(container_id)
            .await
            .map_err(|source| TaskError::RemoveContainer {
                container_id: container_id.to_string(),
                source,
            })?;

        info!(container_id, "container stopped and removed");
        Ok(DockerResult::success(
            container_id.to_string(),
            Action::Stop,
            "success",
        ))
    }
}
