//! Docker-in-Docker sandboxes.
//!
//! A sandbox is a privileged `docker:stable-dind` container whose inner daemon
//! is published on a host port. It can be routed through a mitmproxy
//! environment and made to trust a private registry's CA.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pls::docker::BollardClient;
//! use pls::provision::Provisioner;
//! use pls::sandbox::SandboxSpec;
//!
//! # async fn example() -> pls::Result<()> {
//! let client = BollardClient::connect_with_local_defaults()
//!     .map_err(pls::Error::DaemonUnreachable)?;
//! let provisioner = Provisioner::new(Arc::new(client));
//!
//! let sandbox = provisioner
//!     .create_sandbox(SandboxSpec::new().with_proxy("mitm-test"))
//!     .await?;
//! println!("DOCKER_HOST={}", sandbox.endpoint());
//! # Ok(())
//! # }
//! ```

mod command;
mod config;
mod container;
mod trust;

pub use command::{DIND_PORT, DOCKER_SOCKET, StartCommand};
pub use config::{DEFAULT_REGISTRY, SandboxSpec};
pub use container::Sandbox;
pub use trust::{
    CERTIFICATE_DIRECTORY, InsecureRegistryCa, PROXY_CA_FILENAME, REGISTRY_CA_FILENAME,
    RegistryCaSource, registry_host, stage_certificate,
};
