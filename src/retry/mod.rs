//! Bounded, cancellable retries.
//!
//! Everything that waits for a container to become ready goes through
//! [`RetryRunner`]: the dind health check, copying the mitmproxy CA out of its
//! container, and probing for an unused container name.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pls::retry::{RetryPolicy, RetryRunner};
//!
//! # async fn example() {
//! let policy = RetryPolicy::new()
//!     .with_delay(Duration::from_secs(1))
//!     .with_max_attempts(30);
//!
//! let result = RetryRunner::new(policy)
//!     .run(None, || async { Ok::<_, std::io::Error>("ready") })
//!     .await;
//! assert!(result.is_ok());
//! # }
//! ```

mod policy;
mod runner;

pub use policy::RetryPolicy;
pub use runner::{RetryError, RetryRunner};
