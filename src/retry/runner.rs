//! Runs an operation under a [`RetryPolicy`].

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::RetryPolicy;

/// Why a retried operation did not produce a value.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The cancellation signal fired before the operation succeeded.
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// Every attempt failed; carries the last error.
    #[error("gave up after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Returns true if the runner stopped because of cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Number of attempts made before stopping.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Cancelled { attempts } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Invokes an operation once per policy tick until it succeeds, the policy is
/// exhausted, or the caller cancels.
///
/// Attempts never overlap: the next tick is only awaited after the current
/// attempt has finished. Cancellation is observed between attempts, never
/// in the middle of one.
#[derive(Debug)]
pub struct RetryRunner {
    policy: RetryPolicy,
}

impl RetryRunner {
    /// Creates a runner that owns the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Runs `attempt` until it succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RetryError::Cancelled` if `cancel` fires first (cancellation
    /// wins when it is ready at the same time as the next tick), or
    /// `RetryError::Exhausted` with the last failure once the budget is spent.
    pub async fn run<T, E, F, Fut>(
        mut self,
        cancel: Option<&CancellationToken>,
        mut attempt: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut ticker = self.policy.ticker();
        let mut attempts = 0;
        let mut last_error = None;

        while !self.policy.is_exhausted() {
            tokio::select! {
                biased;
                () = cancelled(cancel) => {
                    trace!(attempts, "Retry cancelled");
                    self.policy.cancel();
                }
                _ = ticker.tick() => {
                    attempts += 1;
                    match attempt().await {
                        Ok(value) => return Ok(value),
                        Err(err) => {
                            self.policy.report(&err);
                            last_error = Some(err);
                        }
                    }
                }
            }
        }

        // Cancellation that races the final failed attempt still reports as cancellation.
        let was_cancelled = cancel.is_some_and(CancellationToken::is_cancelled);
        match last_error {
            Some(source) if !was_cancelled => Err(RetryError::Exhausted { attempts, source }),
            _ => Err(RetryError::Cancelled { attempts }),
        }
    }
}

async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
