//! Error types for pls.
//!
//! Uses thiserror for deriving std::error::Error and miette for rich diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use crate::namegen::ProbeError;
use crate::retry::RetryError;

/// Error returned by the docker daemon API.
pub type DockerError = bollard::errors::Error;

/// Top-level error type for the application.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A daemon API call failed. Nothing created before the failing call is removed.
    #[error("failed to {operation} '{resource}'")]
    #[diagnostic(
        code(pls::daemon),
        help("resources created before this step are left behind; remove them with `pls dind prune` or `pls mitm prune`")
    )]
    Daemon {
        operation: &'static str,
        resource: String,
        #[source]
        source: DockerError,
    },

    /// The daemon could not be reached during preflight.
    #[error("docker daemon is not reachable")]
    #[diagnostic(
        code(pls::system::unreachable),
        help("Check that dockerd is running and that DOCKER_HOST points at it")
    )]
    DaemonUnreachable(#[source] DockerError),

    /// The daemon speaks an API version that is too old.
    #[error("docker API version {found} is below minimum required {required}")]
    #[diagnostic(
        code(pls::system::api_version),
        help("Upgrade the docker engine; volume mounts need API 1.25 or later")
    )]
    DaemonTooOld { found: String, required: String },

    /// A referenced mitmproxy container does not exist.
    #[error("mitmproxy container '{name}' not found")]
    #[diagnostic(
        code(pls::proxy::not_found),
        help("Create one with `pls mitm create --name {name}`")
    )]
    ProxyNotFound {
        name: String,
        #[source]
        source: DockerError,
    },

    /// A referenced container has no endpoint on a network named after it.
    #[error("container '{name}' is not attached to a network named '{name}'")]
    #[diagnostic(
        code(pls::proxy::network),
        help("Only containers created with `pls mitm create` can be used as a proxy")
    )]
    ProxyNetworkMissing { name: String },

    /// No unused container name was found before the retry budget ran out.
    #[error("failed to allocate an unused container name with prefix '{prefix}'")]
    #[diagnostic(code(pls::namegen), help("Pass an explicit name with --name"))]
    NameAllocation {
        prefix: String,
        #[source]
        source: RetryError<ProbeError>,
    },

    /// The inner daemon never answered a ping.
    #[error("dind daemon in '{name}' did not become healthy")]
    #[diagnostic(code(pls::sandbox::healthcheck))]
    HealthCheck {
        name: String,
        #[source]
        source: RetryError<DockerError>,
    },

    /// The mitmproxy CA certificate never appeared.
    #[error("failed to copy CA certificate from mitmproxy '{name}'")]
    #[diagnostic(
        code(pls::proxy::certificate),
        help("mitmproxy writes its CA on first start; check `docker logs {name}`")
    )]
    CertificateRetrieval {
        name: String,
        #[source]
        source: RetryError<DockerError>,
    },

    /// A retried operation was interrupted by the caller.
    #[error("cancelled while waiting to {operation}")]
    #[diagnostic(code(pls::cancelled))]
    Cancelled { operation: String },

    /// The registry CA could not be downloaded.
    #[error("failed to fetch CA certificate from registry '{address}'")]
    #[diagnostic(
        code(pls::registry::certificate),
        help("The registry must serve its CA certificate at https://<registry>/ca")
    )]
    RegistryCertificate {
        address: String,
        #[source]
        source: reqwest::Error,
    },

    /// `docker login` inside the sandbox exited unsuccessfully.
    #[error("docker login to '{registry}' in '{name}' exited with code {exit_code}: {output}")]
    #[diagnostic(code(pls::registry::login))]
    RegistryLogin {
        name: String,
        registry: String,
        exit_code: i64,
        output: String,
    },

    /// The published port for the inner daemon could not be determined.
    #[error("container '{name}' has no host binding for port {port}/tcp")]
    #[diagnostic(code(pls::sandbox::port))]
    MissingHostBinding { name: String, port: u16 },

    /// Building or reading a tar archive failed.
    #[error("failed to {context}")]
    #[diagnostic(code(pls::archive))]
    Archive {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON output error
    #[error("failed to encode output")]
    #[diagnostic(code(pls::output))]
    Output(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(code(pls::io))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Annotates a daemon API error with the operation and resource it concerned.
    pub(crate) fn daemon(
        operation: &'static str,
        resource: impl Into<String>,
    ) -> impl FnOnce(DockerError) -> Self {
        let resource = resource.into();
        move |source| Self::Daemon {
            operation,
            resource,
            source,
        }
    }

    /// Converts the outcome of a retried operation, keeping cancellation distinct
    /// from running out of attempts.
    pub(crate) fn from_retry<E>(
        err: RetryError<E>,
        operation: impl Into<String>,
        exhausted: impl FnOnce(RetryError<E>) -> Self,
    ) -> Self {
        match err {
            RetryError::Cancelled { .. } => Self::Cancelled {
                operation: operation.into(),
            },
            err @ RetryError::Exhausted { .. } => exhausted(err),
        }
    }

    /// Returns true if this error was caused by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
