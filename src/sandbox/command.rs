//! The shell command that boots the inner daemon.

/// Port the inner daemon listens on for TCP API connections.
pub const DIND_PORT: u16 = 2375;

/// Unix socket the inner daemon serves inside the container.
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Builds the `sh -c` argument that starts dockerd.
///
/// The trust store is refreshed first whenever a certificate was staged, so
/// dockerd sees the proxy and registry CAs. With a proxy, dockerd's outbound
/// HTTPS goes through `proxy_address`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartCommand {
    proxy_address: Option<String>,
    refresh_trust: bool,
}

impl StartCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes dockerd's HTTPS traffic through `address` (`host:port`).
    #[must_use]
    pub fn with_proxy(mut self, address: impl Into<String>) -> Self {
        self.proxy_address = Some(address.into());
        self.refresh_trust = true;
        self
    }

    /// Runs `update-ca-certificates` before dockerd.
    #[must_use]
    pub fn with_trust_refresh(mut self) -> Self {
        self.refresh_trust = true;
        self
    }

    /// The script passed to `sh -c`.
    #[must_use]
    pub fn script(&self) -> String {
        let mut parts = Vec::new();
        if self.refresh_trust {
            parts.push(String::from("update-ca-certificates;"));
        }
        if let Some(address) = &self.proxy_address {
            parts.push(format!("HTTPS_PROXY={address}"));
        }
        parts.push(format!(
            "dockerd -H unix://{DOCKER_SOCKET} -H tcp://0.0.0.0:{DIND_PORT}"
        ));
        parts.join(" ")
    }

    /// Entrypoint and command for the container config.
    #[must_use]
    pub fn into_container_args(self) -> (Vec<String>, Vec<String>) {
        (
            vec![String::from("sh")],
            vec![String::from("-c"), self.script()],
        )
    }
}
