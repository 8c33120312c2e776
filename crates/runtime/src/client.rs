//! Bollard-backed container runtime client.
//!
//! [`DockerRuntime`] connects lazily and caches the connection so the engine
//! may come up after the application does; any call made while disconnected
//! retries the connection first. On macOS the Colima socket is probed when
//! the default socket is absent.

use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecResults};
use bollard::models::{ContainerSummary, ImageSummary, Network, Volume};
use bollard::query_parameters::{
    CreateImageOptions, InspectContainerOptions, ListContainersOptions, ListImagesOptions,
    ListNetworksOptions, ListVolumesOptions, LogsOptions, RemoveContainerOptions,
    RemoveImageOptions, RemoveVolumeOptions, RestartContainerOptions, StartContainerOptions,
    StatsOptions, StopContainerOptions,
};
use bollard::Docker;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Mutex;

use crate::api::{
    ByteStream, ContainerRuntime, ExecAttachment, LogStreamOptions, ProgressStream, PullProgress,
    TermSize,
};
use crate::error::{Result, RuntimeError};
use crate::stats::StatsSnapshot;

/// Shell bootstrap for interactive execs: prefer bash, fall back to sh.
const EXEC_SHELL_PROBE: &str = "if command -v bash > /dev/null; then exec bash; else exec sh; fi";

/// One-shot container action requested by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    Remove,
}

struct Inner {
    client: Option<Docker>,
    path: String,
}

/// Lazily connected, cached engine client.
pub struct DockerRuntime {
    inner: Mutex<Inner>,
    socket_override: Option<String>,
}

/// Connects to the engine, preferring an explicit socket, then the default
/// connection, then Colima's socket on macOS. Returns the client and a label
/// for the path that worked.
fn connect(socket_override: Option<&str>) -> std::result::Result<(Docker, String), bollard::errors::Error> {
    if let Some(path) = socket_override {
        let docker = Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)?;
        return Ok((docker, path.to_string()));
    }

    if let Ok(docker) = Docker::connect_with_local_defaults() {
        return Ok((docker, "default".to_string()));
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            let colima_socket = format!("{home}/.colima/default/docker.sock");
            if std::path::Path::new(&colima_socket).exists() {
                let docker =
                    Docker::connect_with_socket(&colima_socket, 120, bollard::API_DEFAULT_VERSION)?;
                return Ok((docker, colima_socket));
            }
        }
    }

    let docker = Docker::connect_with_local_defaults()?;
    Ok((docker, "default".to_string()))
}

impl DockerRuntime {
    /// Creates a client, attempting an eager connection. Failure is not an
    /// error here; the engine may not be up yet.
    pub fn new(socket_override: Option<String>) -> Self {
        let (client, path) = match connect(socket_override.as_deref()) {
            Ok((docker, path)) => (Some(docker), path),
            Err(_) => (None, String::new()),
        };
        Self {
            inner: Mutex::new(Inner { client, path }),
            socket_override,
        }
    }

    /// Returns the cached client, reconnecting when there is none.
    fn client(&self) -> Result<Docker> {
        {
            let guard = self.inner.lock().unwrap();
            if let Some(ref docker) = guard.client {
                return Ok(docker.clone());
            }
        }

        let (docker, path) = connect(self.socket_override.as_deref())
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        let mut guard = self.inner.lock().unwrap();
        guard.client = Some(docker.clone());
        guard.path = path;
        Ok(docker)
    }

    /// Drops the cached connection so the next call reconnects.
    pub fn invalidate(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.client = None;
    }

    /// The socket path label of the active connection.
    pub fn connection_path(&self) -> String {
        self.inner.lock().unwrap().path.clone()
    }

    /// Verifies the engine is reachable.
    pub async fn ping(&self) -> Result<()> {
        let docker = self.client()?;
        docker.ping().await.map_err(|e| {
            self.invalidate();
            RuntimeError::Unavailable(e.to_string())
        })?;
        Ok(())
    }

    /// Lists all containers, including stopped ones.
    pub async fn list_containers(&self) -> Result<Vec<ContainerSummary>> {
        let docker = self.client()?;
        let options = Some(ListContainersOptions {
            all: true,
            ..Default::default()
        });
        Ok(docker.list_containers(options).await?)
    }

    /// Applies a lifecycle action to a container.
    pub async fn container_action(&self, id: &str, action: ContainerAction) -> Result<()> {
        let docker = self.client()?;
        match action {
            ContainerAction::Start => {
                docker
                    .start_container(id, None::<StartContainerOptions>)
                    .await?
            }
            ContainerAction::Stop => {
                docker.stop_container(id, None::<StopContainerOptions>).await?
            }
            ContainerAction::Restart => {
                docker
                    .restart_container(id, None::<RestartContainerOptions>)
                    .await?
            }
            ContainerAction::Remove => {
                docker
                    .remove_container(id, None::<RemoveContainerOptions>)
                    .await?
            }
        }
        Ok(())
    }

    pub async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let docker = self.client()?;
        Ok(docker.list_images(None::<ListImagesOptions>).await?)
    }

    pub async fn list_volumes(&self) -> Result<Vec<Volume>> {
        let docker = self.client()?;
        let response = docker.list_volumes(None::<ListVolumesOptions>).await?;
        Ok(response.volumes.unwrap_or_default())
    }

    pub async fn list_networks(&self) -> Result<Vec<Network>> {
        let docker = self.client()?;
        Ok(docker.list_networks(None::<ListNetworksOptions>).await?)
    }

    pub async fn remove_image(&self, id: &str) -> Result<()> {
        let docker = self.client()?;
        docker
            .remove_image(id, None::<RemoveImageOptions>, None)
            .await?;
        Ok(())
    }

    pub async fn remove_volume(&self, name: &str) -> Result<()> {
        let docker = self.client()?;
        docker
            .remove_volume(name, None::<RemoveVolumeOptions>)
            .await?;
        Ok(())
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn attach_logs(
        &self,
        container_id: &str,
        options: &LogStreamOptions,
    ) -> Result<ByteStream> {
        let docker = self.client()?;

        // Fail fast on a missing container instead of through the stream.
        docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;

        let logs_options = Some(LogsOptions {
            follow: true,
            stdout: true,
            stderr: true,
            timestamps: options.timestamps,
            tail: options.tail.to_string(),
            ..Default::default()
        });

        let stream = docker
            .logs(container_id, logs_options)
            .map(|item| item.map(|chunk| chunk.into_bytes()).map_err(RuntimeError::from));

        Ok(stream.boxed())
    }

    async fn create_exec(&self, container_id: &str, size: TermSize) -> Result<ExecAttachment> {
        let docker = self.client()?;
        let size = size.normalized();

        let inspect = docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await?;
        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        if !running {
            return Err(RuntimeError::InvalidState(format!(
                "container {container_id} is not running"
            )));
        }

        let exec_options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            attach_stdin: Some(true),
            tty: Some(true),
            cmd: Some(vec!["/bin/sh", "-c", EXEC_SHELL_PROBE]),
            ..Default::default()
        };

        let exec = docker.create_exec(container_id, exec_options).await?;

        match docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { output, input } => {
                // Size the pty before handing the attachment out so the first
                // prompt already reflows correctly. A failed resize is not
                // fatal to the session.
                if let Err(e) = docker
                    .resize_exec(
                        &exec.id,
                        ResizeExecOptions {
                            width: size.cols,
                            height: size.rows,
                        },
                    )
                    .await
                {
                    tracing::warn!(exec_id = %exec.id, error = %e, "Initial pty resize failed");
                }

                let output = output
                    .map(|item| item.map(|chunk| chunk.into_bytes()).map_err(RuntimeError::from))
                    .boxed();

                Ok(ExecAttachment {
                    exec_id: exec.id,
                    input,
                    output,
                })
            }
            StartExecResults::Detached => Err(RuntimeError::Upstream(
                "engine started exec in detached mode".to_string(),
            )),
        }
    }

    async fn resize_exec(&self, exec_id: &str, size: TermSize) -> Result<()> {
        let docker = self.client()?;
        let size = size.normalized();
        docker
            .resize_exec(
                exec_id,
                ResizeExecOptions {
                    width: size.cols,
                    height: size.rows,
                },
            )
            .await?;
        Ok(())
    }

    async fn pull_image(&self, reference: &str) -> Result<ProgressStream> {
        let docker = self.client()?;

        let options = Some(CreateImageOptions {
            from_image: Some(reference.to_string()),
            ..Default::default()
        });

        let stream = docker.create_image(options, None, None).map(|item| {
            let info = item.map_err(RuntimeError::from)?;
            if let Some(message) = info.error {
                return Err(RuntimeError::Upstream(message));
            }
            Ok(PullProgress {
                status: info.status.unwrap_or_default(),
                layer: info.id,
                current: info.progress_detail.as_ref().and_then(|d| d.current),
                total: info.progress_detail.as_ref().and_then(|d| d.total),
            })
        });

        Ok(stream.boxed())
    }

    async fn stats(&self, container_id: &str) -> Result<StatsSnapshot> {
        let docker = self.client()?;

        let mut stream = docker.stats(
            container_id,
            Some(StatsOptions {
                stream: false,
                ..Default::default()
            }),
        );

        match stream.next().await {
            Some(Ok(response)) => Ok(StatsSnapshot::from_response(&response)),
            Some(Err(e)) => Err(e.into()),
            None => Err(RuntimeError::Upstream(
                "engine returned no stats sample".to_string(),
            )),
        }
    }
}
