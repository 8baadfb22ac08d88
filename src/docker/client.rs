//! The daemon client capability and its bollard implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, ListContainersOptions,
    LogOutput, RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, EndpointSettings,
    SystemVersion,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, PruneNetworksOptions};
use bollard::volume::CreateVolumeOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use bytes::Bytes;
use futures::TryStreamExt;
use tracing::{debug, trace};

use crate::error::DockerError;

/// Seconds to wait on a single daemon API request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Address at which a daemon accepts API connections over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEndpoint {
    /// Host address, e.g. the bridge gateway.
    pub host: String,
    /// Published host port.
    pub port: u16,
}

impl DaemonEndpoint {
    /// Creates an endpoint from a host address and port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DaemonEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// Output from a command executed inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code from the command (0 typically indicates success).
    pub exit_code: i64,
}

impl CommandOutput {
    /// Returns `true` if the command exited successfully (exit code 0).
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Everything pls needs from a container daemon.
///
/// Implemented by [`BollardClient`] for real daemons. Components never reach
/// for a global client; they are handed an `Arc<dyn DaemonClient>`.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    async fn ping(&self) -> Result<(), DockerError>;
    async fn version(&self) -> Result<SystemVersion, DockerError>;
    async fn inspect_image(&self, image: &str) -> Result<(), DockerError>;
    async fn pull_image(&self, image: &str) -> Result<(), DockerError>;
    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError>;
    async fn start_container(&self, id: &str) -> Result<(), DockerError>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError>;
    async fn list_containers(
        &self,
        options: ListContainersOptions<String>,
    ) -> Result<Vec<ContainerSummary>, DockerError>;
    async fn remove_container(
        &self,
        id: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), DockerError>;
    async fn create_network(&self, options: CreateNetworkOptions<String>)
    -> Result<(), DockerError>;
    async fn connect_network(&self, network: &str, container: &str) -> Result<(), DockerError>;
    /// Removes unused networks matching `filters`, returning the deleted names.
    async fn prune_networks(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, DockerError>;
    async fn create_volume(&self, options: CreateVolumeOptions<String>) -> Result<(), DockerError>;
    /// Copies `path` out of a container as a tar archive.
    async fn copy_from_container(&self, id: &str, path: &str) -> Result<Bytes, DockerError>;
    /// Extracts a tar archive into directory `path` of a container.
    async fn copy_to_container(&self, id: &str, path: &str, archive: Bytes)
    -> Result<(), DockerError>;
    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<CommandOutput, DockerError>;
    /// Opens a client for another daemon reachable at `endpoint`.
    fn connect(&self, endpoint: &DaemonEndpoint) -> Result<Arc<dyn DaemonClient>, DockerError>;
}

/// Returns true if the daemon answered 404.
#[must_use]
pub fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Keeps the parts of `GET /version` the preflight reads.
fn system_version(version: bollard::system::Version) -> SystemVersion {
    SystemVersion {
        version: version.version,
        api_version: version.api_version,
        os: version.os,
        arch: version.arch,
        ..Default::default()
    }
}

/// [`DaemonClient`] backed by a bollard connection.
#[derive(Clone)]
pub struct BollardClient {
    docker: Docker,
}

impl BollardClient {
    /// Wraps an existing bollard connection.
    #[must_use]
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connects using `DOCKER_HOST`, falling back to the local socket.
    ///
    /// # Errors
    ///
    /// Returns the bollard error if the connection parameters are invalid.
    pub fn connect_with_local_defaults() -> Result<Self, DockerError> {
        Docker::connect_with_local_defaults().map(Self::new)
    }
}

impl fmt::Debug for BollardClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BollardClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl DaemonClient for BollardClient {
    async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await.map(|_| ())
    }

    async fn version(&self) -> Result<SystemVersion, DockerError> {
        self.docker.version().await.map(system_version)
    }

    async fn inspect_image(&self, image: &str) -> Result<(), DockerError> {
        self.docker.inspect_image(image).await.map(|_| ())
    }

    async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));
        while let Some(info) = progress.try_next().await? {
            if let Some(status) = info.status {
                trace!(image, %status, "Pull progress");
            }
        }
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError> {
        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };
        self.docker.create_container(Some(options), config).await
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.docker.inspect_container(id, None).await
    }

    async fn list_containers(
        &self,
        options: ListContainersOptions<String>,
    ) -> Result<Vec<ContainerSummary>, DockerError> {
        self.docker.list_containers(Some(options)).await
    }

    async fn remove_container(
        &self,
        id: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), DockerError> {
        self.docker.remove_container(id, Some(options)).await
    }

    async fn create_network(
        &self,
        options: CreateNetworkOptions<String>,
    ) -> Result<(), DockerError> {
        self.docker.create_network(options).await.map(|_| ())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), DockerError> {
        let options = ConnectNetworkOptions {
            container: container.to_string(),
            endpoint_config: EndpointSettings::default(),
        };
        self.docker.connect_network(network, options).await
    }

    async fn prune_networks(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, DockerError> {
        let response = self
            .docker
            .prune_networks(Some(PruneNetworksOptions { filters }))
            .await?;
        Ok(response.networks_deleted.unwrap_or_default())
    }

    async fn create_volume(&self, options: CreateVolumeOptions<String>) -> Result<(), DockerError> {
        self.docker.create_volume(options).await.map(|_| ())
    }

    async fn copy_from_container(&self, id: &str, path: &str) -> Result<Bytes, DockerError> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };
        let mut stream = Box::pin(self.docker.download_from_container(id, Some(options)));
        let mut archive = Vec::new();
        while let Some(chunk) = stream.try_next().await? {
            archive.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(archive))
    }

    async fn copy_to_container(
        &self,
        id: &str,
        path: &str,
        archive: Bytes,
    ) -> Result<(), DockerError> {
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), archive)
            .await
    }

    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<CommandOutput, DockerError> {
        let exec = self
            .docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.try_next().await? {
                match chunk {
                    LogOutput::StdErr { message } => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    LogOutput::StdIn { .. } => {}
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);
        debug!(container = id, exit_code, "Exec completed");

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    fn connect(&self, endpoint: &DaemonEndpoint) -> Result<Arc<dyn DaemonClient>, DockerError> {
        let docker = Docker::connect_with_http(
            &endpoint.to_string(),
            REQUEST_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )?;
        Ok(Arc::new(Self::new(docker)))
    }
}
