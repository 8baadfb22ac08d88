//! Docker-in-Docker sandbox lifecycle.
//!
//! Creating a sandbox walks through these states in order:
//!
//! 1. name resolved (given or allocated)
//! 2. container created, not started
//! 3. attached to the proxy network (optional)
//! 4. proxy and registry CAs staged into the certificate directory (optional)
//! 5. container started, endpoint derived from the published port
//! 6. inner daemon healthy
//! 7. registry login attempted (optional, non-fatal)
//!
//! Certificates must be in place before step 5 because the start command runs
//! `update-ca-certificates` before dockerd. A failure anywhere leaves the
//! resources created so far in place.

use std::sync::Arc;

use bollard::container::Config;
use bollard::models::HostConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::command::{DIND_PORT, StartCommand};
use super::trust::{PROXY_CA_FILENAME, REGISTRY_CA_FILENAME, stage_certificate};
use super::SandboxSpec;
use crate::docker::{DaemonClient, DaemonEndpoint, exposed_tcp_ports, host_binding};
use crate::error::{Error, Result};
use crate::provision::{Kind, Provisioner};
use crate::proxy::ProxyEnvironment;
use crate::retry::{RetryPolicy, RetryRunner};

/// A running dind container with a healthy inner daemon.
pub struct Sandbox {
    /// Container ID on the outer daemon.
    pub id: String,

    /// Container name.
    pub name: String,

    /// Proxy environment the sandbox routes through, if any.
    pub proxy: Option<ProxyEnvironment>,

    endpoint: DaemonEndpoint,
    registry: String,
    client: Arc<dyn DaemonClient>,
    health: RetryPolicy,
    login_error: Option<Error>,
}

impl Sandbox {
    /// Creates, wires, starts and health-checks a new sandbox.
    ///
    /// The dind image must already be present; [`Provisioner::create_sandbox`]
    /// takes care of that.
    ///
    /// # Errors
    ///
    /// Fails on the first daemon error, on an unknown or invalid proxy, when
    /// a CA cannot be obtained, or when the inner daemon never becomes
    /// healthy. A failed registry login is not an error; see
    /// [`Sandbox::login_error`].
    #[instrument(skip(provisioner, spec), fields(name = ?spec.name, proxy = ?spec.proxy_name))]
    pub async fn create(provisioner: &Provisioner, spec: SandboxSpec) -> Result<Self> {
        let client = provisioner.client();
        let name = match &spec.name {
            Some(name) => name.clone(),
            None => provisioner.allocate_name(Kind::Dind).await?,
        };

        let proxy = match &spec.proxy_name {
            Some(proxy_name) => {
                Some(ProxyEnvironment::resolve_existing(provisioner, proxy_name).await?)
            }
            None => None,
        };

        let mut command = StartCommand::new();
        if let Some(proxy) = &proxy {
            command = command.with_proxy(proxy.proxy_address());
        }
        if !spec.is_default_registry() {
            command = command.with_trust_refresh();
        }
        let (entrypoint, cmd) = command.into_container_args();

        let config = Config {
            image: Some(provisioner.config().dind_image.clone()),
            labels: Some(Kind::Dind.labels()),
            entrypoint: Some(entrypoint),
            cmd: Some(cmd),
            exposed_ports: Some(exposed_tcp_ports(&[DIND_PORT])),
            host_config: Some(HostConfig {
                privileged: Some(true),
                publish_all_ports: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let id = client
            .create_container(&name, config)
            .await
            .map_err(Error::daemon("create dind container", &name))?
            .id;
        debug!(%id, "Created dind container");

        if let Some(proxy) = &proxy {
            client
                .connect_network(&proxy.network, &id)
                .await
                .map_err(Error::daemon("connect dind to network", &proxy.network))?;

            let pem = proxy.ca_certificate(provisioner).await?;
            stage_certificate(client, &id, PROXY_CA_FILENAME, &pem).await?;
        }

        if !spec.is_default_registry() {
            let pem = provisioner.registry_ca().fetch(spec.registry()).await?;
            stage_certificate(client, &id, REGISTRY_CA_FILENAME, &pem).await?;
        }

        client
            .start_container(&id)
            .await
            .map_err(Error::daemon("start dind container", &name))?;

        let inspect = client
            .inspect_container(&id)
            .await
            .map_err(Error::daemon("inspect dind container", &name))?;
        let endpoint = host_binding(&inspect, DIND_PORT).ok_or_else(|| Error::MissingHostBinding {
            name: name.clone(),
            port: DIND_PORT,
        })?;
        let inner = client
            .connect(&endpoint)
            .map_err(Error::daemon("connect to dind daemon", endpoint.to_string()))?;

        let mut sandbox = Self {
            id,
            name,
            endpoint,
            proxy,
            registry: spec.registry().to_string(),
            client: inner,
            health: provisioner.config().health_check.clone(),
            login_error: None,
        };
        sandbox.healthcheck(Some(provisioner.cancel_token())).await?;
        info!(endpoint = %sandbox.endpoint, "Started dind '{}'", sandbox.name);

        if let Some((username, password)) = spec.credentials() {
            if let Err(err) = sandbox.login(provisioner, username, password).await {
                warn!(error = %err, "Registry login failed; sandbox is still usable");
                sandbox.login_error = Some(err);
            }
        }

        Ok(sandbox)
    }

    /// Pings the inner daemon until it answers.
    ///
    /// # Errors
    ///
    /// Returns `Error::HealthCheck` once the budget is spent, or
    /// `Error::Cancelled` if `cancel` fires first.
    #[instrument(skip(self, cancel), fields(name = %self.name))]
    pub async fn healthcheck(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        let client = self.client.as_ref();
        RetryRunner::new(self.health.clone())
            .run(cancel, move || client.ping())
            .await
            .map_err(|err| {
                Error::from_retry(err, "ping dind daemon", |source| Error::HealthCheck {
                    name: self.name.clone(),
                    source,
                })
            })
    }

    /// Runs `docker login` against the sandbox's registry inside the container.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` if the exec cannot run and
    /// `Error::RegistryLogin` if it exits unsuccessfully.
    #[instrument(skip(self, provisioner, password), fields(name = %self.name, registry = %self.registry))]
    pub async fn login(&self, provisioner: &Provisioner, username: &str, password: &str) -> Result<()> {
        let cmd = vec![
            String::from("docker"),
            String::from("login"),
            String::from("-u"),
            username.to_string(),
            String::from("-p"),
            password.to_string(),
            self.registry.clone(),
        ];
        let output = provisioner
            .client()
            .exec(&self.id, cmd)
            .await
            .map_err(Error::daemon("run docker login in", &self.name))?;

        if !output.success() {
            let message = if output.stderr.trim().is_empty() {
                output.stdout.trim()
            } else {
                output.stderr.trim()
            };
            return Err(Error::RegistryLogin {
                name: self.name.clone(),
                registry: self.registry.clone(),
                exit_code: output.exit_code,
                output: message.to_string(),
            });
        }

        info!("Logged in to {}", self.registry);
        Ok(())
    }

    /// Where the inner daemon's API is published.
    #[must_use]
    pub fn endpoint(&self) -> &DaemonEndpoint {
        &self.endpoint
    }

    /// Client connected to the inner daemon.
    #[must_use]
    pub fn client(&self) -> &dyn DaemonClient {
        self.client.as_ref()
    }

    /// Registry address the sandbox was created for.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Why the post-creation registry login failed, if it did.
    #[must_use]
    pub fn login_error(&self) -> Option<&Error> {
        self.login_error.as_ref()
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("proxy", &self.proxy)
            .field("registry", &self.registry)
            .field("login_error", &self.login_error)
            .finish_non_exhaustive()
    }
}
