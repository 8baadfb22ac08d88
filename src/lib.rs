//! pls - short-lived Docker-in-Docker sandboxes.
//!
//! This crate provisions DinD sandboxes on a docker daemon, optionally routed
//! through a mitmproxy environment so every outbound HTTPS request made by the
//! inner daemon can be inspected.
//!
//! # Requirements
//!
//! - A docker daemon reachable through `DOCKER_HOST` or the local socket
//! - Daemon API version 1.25+
//! - Permission to run privileged containers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pls::docker::BollardClient;
//! use pls::provision::Provisioner;
//! use pls::proxy::ProxySpec;
//! use pls::sandbox::SandboxSpec;
//! use pls::system;
//!
//! #[tokio::main]
//! async fn main() -> miette::Result<()> {
//!     let client = Arc::new(
//!         BollardClient::connect_with_local_defaults().map_err(pls::Error::DaemonUnreachable)?,
//!     );
//!     system::check_all(client.as_ref()).await?;
//!
//!     let provisioner = Provisioner::new(client);
//!     let proxy = provisioner.create_proxy(ProxySpec::new()).await?;
//!     let sandbox = provisioner
//!         .create_sandbox(SandboxSpec::new().with_proxy(&proxy.name))
//!         .await?;
//!
//!     println!("export DOCKER_HOST={}", sandbox.endpoint());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod docker;
pub mod error;
pub mod namegen;
pub mod provision;
pub mod proxy;
pub mod retry;
pub mod sandbox;
pub mod system;

// Re-export commonly used types
pub use config::ProvisionConfig;
pub use error::{Error, Result};
pub use provision::{Kind, Provisioner, PruneReport};
pub use proxy::{ProxyEnvironment, ProxySpec};
pub use sandbox::{Sandbox, SandboxSpec};
