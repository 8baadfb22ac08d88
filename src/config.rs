//! Provisioning configuration: images and readiness budgets.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Image used for dind sandboxes.
pub const DEFAULT_DIND_IMAGE: &str = "docker:stable-dind";

/// Image used for mitmproxy environments.
pub const DEFAULT_MITM_IMAGE: &str = "mitmproxy/mitmproxy";

/// Settings shared by every provisioning flow.
///
/// The retry policies are templates: each retried operation runs its own clone.
///
/// # Example
///
/// ```
/// use pls::config::ProvisionConfig;
/// use pls::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let config = ProvisionConfig::default()
///     .with_dind_image("docker:27-dind")
///     .with_health_check(
///         RetryPolicy::new()
///             .with_delay(Duration::from_millis(500))
///             .with_max_attempts(120),
///     );
/// assert_eq!(config.dind_image, "docker:27-dind");
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Image for the dind container.
    pub dind_image: String,

    /// Image for the mitmproxy container.
    pub mitm_image: String,

    /// Budget for pinging the inner daemon after start.
    pub health_check: RetryPolicy,

    /// Budget for copying the CA out of a freshly started mitmproxy.
    pub certificate: RetryPolicy,

    /// Budget for probing unused container names.
    pub naming: RetryPolicy,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        let every_second = RetryPolicy::new()
            .with_delay(Duration::from_secs(1))
            .with_max_attempts(60);

        Self {
            dind_image: String::from(DEFAULT_DIND_IMAGE),
            mitm_image: String::from(DEFAULT_MITM_IMAGE),
            health_check: every_second.clone(),
            certificate: every_second,
            naming: RetryPolicy::new(),
        }
    }
}

impl ProvisionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dind image.
    #[must_use]
    pub fn with_dind_image(mut self, image: impl Into<String>) -> Self {
        self.dind_image = image.into();
        self
    }

    /// Sets the mitmproxy image.
    #[must_use]
    pub fn with_mitm_image(mut self, image: impl Into<String>) -> Self {
        self.mitm_image = image.into();
        self
    }

    /// Sets the inner daemon health-check budget.
    #[must_use]
    pub fn with_health_check(mut self, policy: RetryPolicy) -> Self {
        self.health_check = policy;
        self
    }

    /// Sets the CA retrieval budget.
    #[must_use]
    pub fn with_certificate(mut self, policy: RetryPolicy) -> Self {
        self.certificate = policy;
        self
    }

    /// Sets the name probing budget.
    #[must_use]
    pub fn with_naming(mut self, policy: RetryPolicy) -> Self {
        self.naming = policy;
        self
    }
}
