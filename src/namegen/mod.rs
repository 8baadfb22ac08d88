//! Container name generation.
//!
//! Names look like `<prefix>-<word>`. Uniqueness is only checked against the
//! containers that exist when the name is probed; nothing is reserved, so two
//! allocators racing on the same prefix can still pick the same name.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::docker::{DaemonClient, is_not_found};
use crate::error::{DockerError, Error, Result};
use crate::retry::{RetryPolicy, RetryRunner};

/// Words appended to the prefix.
const WORDS: &[&str] = &[
    "agate", "amber", "basalt", "beryl", "cobalt", "coral", "flint", "garnet", "granite",
    "gypsum", "jade", "jasper", "jet", "marble", "mica", "nickel", "obsidian", "onyx", "opal",
    "pumice", "pyrite", "quartz", "ruby", "sapphire", "schist", "shale", "slate", "topaz",
    "zircon", "cinnabar", "feldspar", "galena", "halite", "malachite", "olivine", "spinel",
    "talc", "tourmaline", "turquoise", "beryllium",
];

/// Why a probed name could not be used.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// A container with this name already exists.
    #[error("container name '{0}' already in use")]
    Taken(String),

    /// The daemon failed to answer the inspect.
    #[error("failed to inspect container '{name}'")]
    Daemon {
        name: String,
        #[source]
        source: DockerError,
    },
}

/// Allocates container names that are unused at allocation time.
///
/// The random source is injected so tests can make allocation deterministic.
pub struct NameAllocator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl NameAllocator {
    /// Creates an allocator drawing words from `rng`.
    #[must_use]
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Creates an allocator seeded from the operating system.
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Creates an allocator with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Draws a candidate name without checking the daemon.
    pub fn candidate(&self, prefix: &str) -> String {
        let index = {
            // Poisoning leaves the generator state intact.
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.random_range(0..WORDS.len())
        };
        format!("{prefix}-{}", WORDS[index])
    }

    /// Returns a `prefix-<word>` name that no container currently uses.
    ///
    /// Each attempt draws a new candidate and inspects it; only a "not found"
    /// answer ends the search.
    ///
    /// # Errors
    ///
    /// Returns `Error::NameAllocation` once `policy` is exhausted, or
    /// `Error::Cancelled` if `cancel` fires first.
    #[instrument(skip(self, client, policy, cancel))]
    pub async fn allocate(
        &self,
        client: &dyn DaemonClient,
        prefix: &str,
        policy: RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        let name = RetryRunner::new(policy)
            .run(cancel, move || async move {
                let name = self.candidate(prefix);
                match client.inspect_container(&name).await {
                    Err(err) if is_not_found(&err) => Ok(name),
                    Err(source) => Err(ProbeError::Daemon { name, source }),
                    Ok(_) => Err(ProbeError::Taken(name)),
                }
            })
            .await
            .map_err(|err| {
                Error::from_retry(err, format!("allocate a '{prefix}' name"), |source| {
                    Error::NameAllocation {
                        prefix: prefix.to_string(),
                        source,
                    }
                })
            })?;

        debug!(%name, "Allocated container name");
        Ok(name)
    }
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl std::fmt::Debug for NameAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameAllocator")
            .field("words", &WORDS.len())
            .finish_non_exhaustive()
    }
}
