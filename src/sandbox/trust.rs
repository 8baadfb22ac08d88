//! Trust material staged into a sandbox before its daemon starts.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, instrument};

use crate::docker::{DaemonClient, archive};
use crate::error::{Error, Result};

/// Directory scanned by `update-ca-certificates`.
pub const CERTIFICATE_DIRECTORY: &str = "/usr/local/share/ca-certificates";

/// File name of the staged registry CA.
pub const REGISTRY_CA_FILENAME: &str = "registry-ca.crt";

/// File name of the staged mitmproxy CA.
///
/// `update-ca-certificates` only picks up `.crt` files, so the proxy's
/// `.pem` is renamed on the way in.
pub const PROXY_CA_FILENAME: &str = "mitmproxy-ca-cert.crt";

/// Where a registry's CA certificate comes from.
#[async_trait]
pub trait RegistryCaSource: Send + Sync {
    /// Fetches the PEM-encoded CA for the registry at `address`.
    async fn fetch(&self, address: &str) -> Result<Vec<u8>>;
}

/// Downloads the CA from `https://<registry-host>/ca`.
///
/// The registry's certificate is exactly what is being fetched, so it cannot
/// be verified yet and certificate checks are disabled for this request.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureRegistryCa;

#[async_trait]
impl RegistryCaSource for InsecureRegistryCa {
    #[instrument(skip(self))]
    async fn fetch(&self, address: &str) -> Result<Vec<u8>> {
        let fetch_error = |source| Error::RegistryCertificate {
            address: address.to_string(),
            source,
        };

        let url = format!("https://{}/ca", registry_host(address));
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(fetch_error)?;

        let body = client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .bytes()
            .await
            .map_err(fetch_error)?;

        info!(%url, bytes = body.len(), "Fetched registry CA certificate");
        Ok(body.to_vec())
    }
}

/// Host part of a registry address: scheme and path are dropped.
///
/// `https://registry.example.com:5000/v2/` becomes `registry.example.com:5000`.
#[must_use]
pub fn registry_host(address: &str) -> &str {
    let rest = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

/// Writes `pem` into the container's certificate directory as `file_name`.
///
/// # Errors
///
/// Returns `Error::Archive` if the archive cannot be built, or `Error::Daemon`
/// if the copy fails.
#[instrument(skip(client, pem), fields(bytes = pem.len()))]
pub async fn stage_certificate(
    client: &dyn DaemonClient,
    container: &str,
    file_name: &str,
    pem: &[u8],
) -> Result<()> {
    let archive = archive::single_file(file_name, pem)?;
    client
        .copy_to_container(container, CERTIFICATE_DIRECTORY, Bytes::from(archive))
        .await
        .map_err(Error::daemon("stage certificate into", container))?;
    debug!("Staged {CERTIFICATE_DIRECTORY}/{file_name}");
    Ok(())
}
