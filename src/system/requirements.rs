//! Daemon preflight checks.

use tracing::debug;

use crate::docker::DaemonClient;
use crate::error::{Error, Result};

/// Minimum daemon API version (major, minor).
///
/// 1.25 introduced `HostConfig.Mounts`, which the mitmproxy volume relies on.
pub const MIN_API_VERSION: (u32, u32) = (1, 25);

/// What the daemon reported about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonInfo {
    /// Engine version string (e.g., "27.3.1")
    pub version: String,
    /// API version string (e.g., "1.47")
    pub api_version: String,
    /// Parsed API major version
    pub api_major: u32,
    /// Parsed API minor version
    pub api_minor: u32,
    /// Daemon OS/architecture, e.g. "linux/amd64"
    pub platform: String,
}

impl DaemonInfo {
    /// Check if the daemon is new enough.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        (self.api_major, self.api_minor) >= MIN_API_VERSION
    }
}

/// Check every requirement and return what the daemon reported.
///
/// # Errors
///
/// Returns `Error::DaemonUnreachable` if the daemon does not answer and
/// `Error::DaemonTooOld` if its API version is below [`MIN_API_VERSION`].
pub async fn check_all(client: &dyn DaemonClient) -> Result<DaemonInfo> {
    client.ping().await.map_err(Error::DaemonUnreachable)?;
    debug!("Daemon answered ping");

    let version = client.version().await.map_err(Error::DaemonUnreachable)?;
    let api_version = version.api_version.unwrap_or_default();
    let (api_major, api_minor) = check_api_version(&api_version)?;

    Ok(DaemonInfo {
        version: version.version.unwrap_or_default(),
        api_version,
        api_major,
        api_minor,
        platform: format!(
            "{}/{}",
            version.os.unwrap_or_default(),
            version.arch.unwrap_or_default()
        ),
    })
}

/// Check an API version string is at least [`MIN_API_VERSION`].
///
/// # Errors
///
/// Returns `Error::DaemonTooOld` if the version is lower or cannot be parsed.
pub fn check_api_version(api_version: &str) -> Result<(u32, u32)> {
    let too_old = || Error::DaemonTooOld {
        found: api_version.to_string(),
        required: format!("{}.{}", MIN_API_VERSION.0, MIN_API_VERSION.1),
    };

    let version = parse_api_version(api_version).ok_or_else(too_old)?;
    if version < MIN_API_VERSION {
        return Err(too_old());
    }
    Ok(version)
}

/// Parse "1.43" into (1, 43).
fn parse_api_version(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}
