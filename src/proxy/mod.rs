//! mitmproxy environments.
//!
//! An environment is three resources sharing one name: a mitmproxy container,
//! a bridge network the container is attached to, and a volume holding the
//! proxy's CA so it survives container restarts. Sandboxes join the network
//! and trust the CA to have their outbound HTTPS intercepted.

use bollard::container::Config;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::network::CreateNetworkOptions;
use bollard::volume::CreateVolumeOptions;
use tracing::{debug, info, instrument};

use crate::docker::{archive, is_not_found};
use crate::error::{Error, Result};
use crate::provision::{Kind, Provisioner};
use crate::retry::RetryRunner;

/// Port mitmproxy listens on inside its network.
pub const MITM_PORT: u16 = 8080;

/// Directory where mitmproxy keeps its CA.
pub const CA_DIRECTORY: &str = "/home/mitmproxy/.mitmproxy";

/// CA certificate written by mitmproxy on first start.
pub const CA_FILENAME: &str = "mitmproxy-ca-cert.pem";

/// Request for a new mitmproxy environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySpec {
    /// Name for the container, network and volume. Generated when `None`.
    pub name: Option<String>,
}

impl ProxySpec {
    /// Creates a spec with a generated name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Handle to a running mitmproxy environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEnvironment {
    /// Container ID.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Network the proxy serves on; always equal to `name`.
    pub network: String,
}

impl ProxyEnvironment {
    /// Creates the network, volume and container for a new environment and
    /// starts the proxy.
    ///
    /// The image must already be present; [`Provisioner::create_proxy`] takes
    /// care of that. Resources created before a failing step are left in
    /// place.
    ///
    /// # Errors
    ///
    /// Returns `Error::Daemon` for the first daemon call that fails, or a name
    /// allocation error when no name was given.
    #[instrument(skip(provisioner, spec), fields(name = ?spec.name))]
    pub async fn create(provisioner: &Provisioner, spec: ProxySpec) -> Result<Self> {
        let client = provisioner.client();
        let name = match spec.name {
            Some(name) => name,
            None => provisioner.allocate_name(Kind::Mitm).await?,
        };

        client
            .create_network(CreateNetworkOptions {
                name: name.clone(),
                labels: Kind::Mitm.labels(),
                ..Default::default()
            })
            .await
            .map_err(Error::daemon("create network", &name))?;
        debug!(network = %name, "Created network");

        client
            .create_volume(CreateVolumeOptions {
                name: name.clone(),
                labels: Kind::Mitm.labels(),
                ..Default::default()
            })
            .await
            .map_err(Error::daemon("create volume", &name))?;
        debug!(volume = %name, "Created volume");

        let config = Config {
            image: Some(provisioner.config().mitm_image.clone()),
            labels: Some(Kind::Mitm.labels()),
            cmd: Some(vec![String::from("mitmdump")]),
            open_stdin: Some(true),
            host_config: Some(HostConfig {
                mounts: Some(vec![Mount {
                    typ: Some(MountTypeEnum::VOLUME),
                    source: Some(name.clone()),
                    target: Some(String::from(CA_DIRECTORY)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let created = client
            .create_container(&name, config)
            .await
            .map_err(Error::daemon("create mitmproxy container", &name))?;

        client
            .connect_network(&name, &created.id)
            .await
            .map_err(Error::daemon("connect mitmproxy to network", &name))?;

        client
            .start_container(&created.id)
            .await
            .map_err(Error::daemon("start mitmproxy container", &name))?;
        info!(id = %created.id, "Started mitmproxy '{name}'");

        Self::resolve_existing(provisioner, &name).await
    }

    /// Builds a handle for an existing environment.
    ///
    /// The container must be attached to a network with its own name; that is
    /// what distinguishes a proxy environment from any other container.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProxyNotFound` if no such container exists,
    /// `Error::Daemon` if the inspect fails for any other reason, and
    /// `Error::ProxyNetworkMissing` if it lacks the same-named network.
    #[instrument(skip(provisioner))]
    pub async fn resolve_existing(provisioner: &Provisioner, name: &str) -> Result<Self> {
        let inspect = match provisioner.client().inspect_container(name).await {
            Ok(inspect) => inspect,
            Err(source) if is_not_found(&source) => {
                return Err(Error::ProxyNotFound {
                    name: name.to_string(),
                    source,
                });
            }
            Err(source) => return Err(Error::daemon("inspect mitmproxy container", name)(source)),
        };

        let on_own_network = inspect
            .network_settings
            .as_ref()
            .and_then(|settings| settings.networks.as_ref())
            .is_some_and(|networks| networks.contains_key(name));
        if !on_own_network {
            return Err(Error::ProxyNetworkMissing {
                name: name.to_string(),
            });
        }

        Ok(Self {
            id: inspect.id.unwrap_or_else(|| name.to_string()),
            name: name.to_string(),
            network: name.to_string(),
        })
    }

    /// Path of the CA certificate inside the proxy container.
    #[must_use]
    pub fn ca_path() -> String {
        format!("{CA_DIRECTORY}/{CA_FILENAME}")
    }

    /// Address sandboxes use to reach the proxy over the shared network.
    #[must_use]
    pub fn proxy_address(&self) -> String {
        format!("{}:{MITM_PORT}", self.name)
    }

    /// Copies the proxy's CA certificate (PEM) out of its container.
    ///
    /// mitmproxy generates the CA asynchronously after start, so the copy is
    /// retried until the file exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::CertificateRetrieval` once the retry budget is spent,
    /// `Error::Cancelled` on cancellation, or `Error::Archive` if the copied
    /// archive holds no file.
    #[instrument(skip(self, provisioner), fields(name = %self.name))]
    pub async fn ca_certificate(&self, provisioner: &Provisioner) -> Result<Vec<u8>> {
        let client = provisioner.client();
        let path = Self::ca_path();
        let (id, path) = (self.id.as_str(), path.as_str());

        let archive = RetryRunner::new(provisioner.config().certificate.clone())
            .run(Some(provisioner.cancel_token()), move || async move {
                client
                    .copy_from_container(id, path)
                    .await
                    .inspect_err(|err| {
                        if is_not_found(err) {
                            debug!("CA certificate not written yet");
                        }
                    })
            })
            .await
            .map_err(|err| {
                Error::from_retry(err, "copy the mitmproxy CA certificate", |source| {
                    Error::CertificateRetrieval {
                        name: self.name.clone(),
                        source,
                    }
                })
            })?;

        archive::first_file(&archive)
    }
}
