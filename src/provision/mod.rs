//! Create, list and prune entrypoints.
//!
//! A [`Provisioner`] bundles everything a provisioning flow needs: the daemon
//! client, the configuration, the name allocator, the registry CA source and
//! the cancellation token. Nothing is global, so tests hand in fakes.

mod inventory;

use std::sync::Arc;

use bollard::container::{ListContainersOptions, RemoveContainerOptions};
use bollard::models::ContainerSummary;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::ProvisionConfig;
use crate::docker::{DaemonClient, ensure_image};
use crate::error::{Error, Result};
use crate::namegen::NameAllocator;
use crate::proxy::{ProxyEnvironment, ProxySpec};
use crate::sandbox::{InsecureRegistryCa, RegistryCaSource, Sandbox, SandboxSpec};

pub use inventory::{INVENTORY_LABEL, Kind};

/// What [`Provisioner::prune`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// IDs of removed containers.
    pub containers: Vec<String>,
    /// Names of removed networks.
    pub networks: Vec<String>,
}

impl PruneReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.networks.is_empty()
    }
}

/// Entry point for provisioning against one daemon.
pub struct Provisioner {
    client: Arc<dyn DaemonClient>,
    config: ProvisionConfig,
    names: NameAllocator,
    registry_ca: Arc<dyn RegistryCaSource>,
    cancel: CancellationToken,
}

impl Provisioner {
    /// Creates a provisioner with default configuration.
    #[must_use]
    pub fn new(client: Arc<dyn DaemonClient>) -> Self {
        Self {
            client,
            config: ProvisionConfig::default(),
            names: NameAllocator::from_os_rng(),
            registry_ca: Arc::new(InsecureRegistryCa),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProvisionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_names(mut self, names: NameAllocator) -> Self {
        self.names = names;
        self
    }

    #[must_use]
    pub fn with_registry_ca(mut self, source: Arc<dyn RegistryCaSource>) -> Self {
        self.registry_ca = source;
        self
    }

    /// Uses `cancel` to interrupt retries. Created resources are kept.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn client(&self) -> &dyn DaemonClient {
        self.client.as_ref()
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn registry_ca(&self) -> &dyn RegistryCaSource {
        self.registry_ca.as_ref()
    }

    /// Allocates an unused `<kind>-<word>` container name.
    ///
    /// # Errors
    ///
    /// Returns `Error::NameAllocation` or `Error::Cancelled`.
    pub async fn allocate_name(&self, kind: Kind) -> Result<String> {
        self.names
            .allocate(
                self.client(),
                kind.prefix(),
                self.config.naming.clone(),
                Some(&self.cancel),
            )
            .await
    }

    /// Pulls the mitmproxy image if needed and creates a proxy environment.
    ///
    /// # Errors
    ///
    /// See [`ProxyEnvironment::create`].
    pub async fn create_proxy(&self, spec: ProxySpec) -> Result<ProxyEnvironment> {
        ensure_image(self.client(), &self.config.mitm_image).await?;
        ProxyEnvironment::create(self, spec).await
    }

    /// Pulls the dind image if needed and creates a sandbox.
    ///
    /// # Errors
    ///
    /// See [`Sandbox::create`].
    pub async fn create_sandbox(&self, spec: SandboxSpec) -> Result<Sandbox> {
        ensure_image(self.client(), &self.config.dind_image).await?;
        Sandbox::create(self, spec).await
    }

    /// Lists containers of `kind`, stopped ones included.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` if the daemon cannot list containers.
    #[instrument(skip(self))]
    pub async fn list(&self, kind: Kind) -> Result<Vec<ContainerSummary>> {
        self.client
            .list_containers(ListContainersOptions {
                all: true,
                filters: kind.filters(),
                ..Default::default()
            })
            .await
            .map_err(Error::daemon("list containers labeled", kind.to_string()))
    }

    /// Force-removes every container of `kind`. For proxies, also prunes the
    /// unused networks carrying the label.
    ///
    /// Stops at the first failed removal.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` for the failing list, removal or prune.
    #[instrument(skip(self))]
    pub async fn prune(&self, kind: Kind) -> Result<PruneReport> {
        let mut report = PruneReport::default();

        let containers = self.list(kind).await?;
        if containers.is_empty() {
            info!("No {} containers were found", kind.label_value());
        }
        for container in containers {
            let Some(id) = container.id else { continue };
            self.client
                .remove_container(
                    &id,
                    RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    },
                )
                .await
                .map_err(Error::daemon("remove container", &id))?;
            info!(
                "Deleted container {:?}",
                container.names.unwrap_or_default()
            );
            report.containers.push(id);
        }

        if kind == Kind::Mitm {
            report.networks = self
                .client
                .prune_networks(kind.filters())
                .await
                .map_err(Error::daemon("prune networks labeled", kind.to_string()))?;
            for network in &report.networks {
                info!("Deleted network '{network}'");
            }
        }

        Ok(report)
    }
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config)
            .field("names", &self.names)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
