//! Container runtime capability consumed by the adapter, and its Docker
//! Engine implementation.

use async_trait::async_trait;
use bollard::{
    Docker,
    container::{
        CreateContainerOptions, LogOutput, LogsOptions, StartContainerOptions,
    },
    image::CreateImageOptions,
    models::{HostConfig, RestartPolicy, RestartPolicyNameEnum},
};
use futures_util::stream::{BoxStream, StreamExt};

use super::types::{Config, HostSettings, LogLine, RuntimeError};

/// The six runtime operations a task lifecycle needs. Any runtime exposing
/// them can back a worker.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pulls `image`, yielding progress messages until the pull finishes.
    fn pull_image(&self, image: &str) -> BoxStream<'_, Result<String, RuntimeError>>;

    /// Creates a container and returns its id.
    async fn create_container(
        &self,
        name: &str,
        config: &Config,
        host: &HostSettings,
    ) -> Result<String, RuntimeError>;

    async fn start_container(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Reads the container's stdout and stderr produced so far.
    fn stream_logs(&self, container_id: &str) -> BoxStream<'_, Result<LogLine, RuntimeError>>;

    async fn stop_container(&self, container_id: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError>;
}

#[derive(Debug, Clone)]
pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    /// Connects using `DOCKER_HOST` or the platform's local socket.
    pub fn connect() -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_local_defaults()?;
        Ok(BollardRuntime { client })
    }

    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.client.ping().await?;
        Ok(())
    }
}

fn restart_policy(name: &str) -> Result<Option<RestartPolicy>, RuntimeError> {
    if name.is_empty() {
        return Ok(None);
    }

    let policy: RestartPolicyNameEnum = name
        .parse()
        .map_err(|_| RuntimeError::InvalidRestartPolicy(name.to_string()))?;

    Ok(Some(RestartPolicy {
        name: Some(policy),
        maximum_retry_count: None,
    }))
}

fn container_config(
    config: &Config,
    host: &HostSettings,
) -> Result<bollard::container::Config<String>, RuntimeError> {
    let host_config = HostConfig {
        restart_policy: restart_policy(&host.restart_policy)?,
        memory: Some(host.memory),
        publish_all_ports: Some(host.publish_all_ports),
        ..Default::default()
    };

    Ok(bollard::container::Config {
        image: Some(config.image.clone()),
        env: Some(config.env.clone()),
        cmd: (!config.cmd.is_empty()).then(|| config.cmd.clone()),
        attach_stdin: Some(config.attach_stdin),
        attach_stdout: Some(config.attach_stdout),
        attach_stderr: Some(config.attach_stderr),
        host_config: Some(host_config),
        ..Default::default()
    })
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    fn pull_image(&self, image: &str) -> BoxStream<'_, Result<String, RuntimeError>> {
        self.client
            .create_image(
                Some(CreateImageOptions {
                    from_image: image.to_string(),
                    ..Default::default()
                }),
                None,
                None,
            )
            .map(|msg| {
                msg.map(|info| info.status.unwrap_or_default())
                    .map_err(RuntimeError::from)
            })
            .boxed()
    }

    async fn create_container(
        &self,
        name: &str,
        config: &Config,
        host: &HostSettings,
    ) -> Result<String, RuntimeError> {
        let container_config = container_config(config, host)?;

        // Docker picks a name when none is given.
        let options = (!name.is_empty()).then(|| CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        });

        let response = self
            .client
            .create_container(options, container_config)
            .await?;

        if response.id.is_empty() {
            return Err(RuntimeError::Other(format!(
                "daemon returned no id for container {name}"
            )));
        }
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    fn stream_logs(&self, container_id: &str) -> BoxStream<'_, Result<LogLine, RuntimeError>> {
        self.client
            .logs(
                container_id,
                Some(LogsOptions::<String> {
                    stdout: true,
                    stderr: true,
                    ..Default::default()
                }),
            )
            .map(|msg| {
                msg.map(|output| match output {
                    LogOutput::StdErr { message } => {
                        LogLine::Stderr(String::from_utf8_lossy(&message).into_owned())
                    }
                    other => LogLine::Stdout(other.to_string()),
                })
                .map_err(RuntimeError::from)
            })
            .boxed()
    }

    async fn stop_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client.stop_container(container_id, None).await?;
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.client.remove_container(container_id, None).await?;
        Ok(())
    }
}
