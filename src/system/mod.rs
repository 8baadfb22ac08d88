//! Preflight validation.
//!
//! This module checks that the daemon pls talks to is reachable and new
//! enough before any resource is created.

mod requirements;

pub use requirements::{DaemonInfo, MIN_API_VERSION, check_all, check_api_version};
