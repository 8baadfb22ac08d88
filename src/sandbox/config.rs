//! Request type for a new sandbox.

/// Registry that needs neither a custom CA nor an explicit address.
pub const DEFAULT_REGISTRY: &str = "https://index.docker.io/v1/";

/// Describes the sandbox to create.
///
/// Use the builder methods to customize it.
///
/// # Example
///
/// ```
/// use pls::sandbox::SandboxSpec;
///
/// let spec = SandboxSpec::default()
///     .with_name("dind-test")
///     .with_proxy("mitm-test")
///     .with_registry("https://registry.example.com")
///     .with_credentials("ci", "hunter2");
///
/// assert!(!spec.is_default_registry());
/// assert!(spec.has_credentials());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SandboxSpec {
    /// Container name. Generated when `None`.
    pub name: Option<String>,

    /// Existing mitmproxy environment to route through.
    pub proxy_name: Option<String>,

    /// Registry address; `None` means [`DEFAULT_REGISTRY`].
    pub registry_address: Option<String>,

    /// Username for `docker login`.
    pub registry_username: Option<String>,

    /// Password for `docker login`.
    pub registry_password: Option<String>,
}

impl SandboxSpec {
    /// Creates a spec for an unproxied sandbox on the default registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the container name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Routes the sandbox through the named mitmproxy environment.
    #[must_use]
    pub fn with_proxy(mut self, proxy_name: impl Into<String>) -> Self {
        self.proxy_name = Some(proxy_name.into());
        self
    }

    /// Sets the registry address.
    #[must_use]
    pub fn with_registry(mut self, address: impl Into<String>) -> Self {
        self.registry_address = Some(address.into());
        self
    }

    /// Sets registry credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.registry_username = Some(username.into());
        self.registry_password = Some(password.into());
        self
    }

    /// The registry address, falling back to [`DEFAULT_REGISTRY`].
    #[must_use]
    pub fn registry(&self) -> &str {
        self.registry_address.as_deref().unwrap_or(DEFAULT_REGISTRY)
    }

    /// Whether the registry is the default one, which needs no CA staging.
    #[must_use]
    pub fn is_default_registry(&self) -> bool {
        self.registry() == DEFAULT_REGISTRY
    }

    /// Username and password, when both are non-empty.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.registry_username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.registry_password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for SandboxSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxSpec")
            .field("name", &self.name)
            .field("proxy_name", &self.proxy_name)
            .field("registry_address", &self.registry_address)
            .field("registry_username", &self.registry_username)
            .field(
                "registry_password",
                &self.registry_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec() {
        let spec = SandboxSpec::default();
        assert!(spec.name.is_none());
        assert!(spec.proxy_name.is_none());
        assert_eq!(spec.registry(), DEFAULT_REGISTRY);
        assert!(spec.is_default_registry());
        assert!(!spec.has_credentials());
    }

    #[test]
    fn test_builder_chain() {
        let spec = SandboxSpec::new()
            .with_name("dind-test")
            .with_proxy("mitm-test")
            .with_registry("https://registry.example.com")
            .with_credentials("ci", "secret");

        assert_eq!(spec.name.as_deref(), Some("dind-test"));
        assert_eq!(spec.proxy_name.as_deref(), Some("mitm-test"));
        assert_eq!(spec.registry(), "https://registry.example.com");
        assert!(!spec.is_default_registry());
        assert_eq!(spec.credentials(), Some(("ci", "secret")));
    }

    #[test]
    fn test_explicit_default_registry() {
        let spec = SandboxSpec::new().with_registry(DEFAULT_REGISTRY);
        assert!(spec.is_default_registry());
    }

    #[test]
    fn test_credentials_need_both_parts() {
        let spec = SandboxSpec::new().with_credentials("ci", "");
        assert!(spec.credentials().is_none());

        let spec = SandboxSpec {
            registry_username: Some(String::from("ci")),
            ..SandboxSpec::default()
        };
        assert!(!spec.has_credentials());
    }

    #[test]
    fn test_debug_redacts_password() {
        let spec = SandboxSpec::new().with_credentials("ci", "secret");
        let debug = format!("{spec:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
