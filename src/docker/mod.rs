//! Container daemon access.
//!
//! [`DaemonClient`] is the capability every component is handed. The rest of
//! this module holds the small pieces of daemon plumbing the provisioning
//! flows share: pulling images on demand, resolving published ports, and
//! building the tar archives the copy API expects.

pub mod archive;
mod client;
mod image;
mod port;

pub use client::{BollardClient, CommandOutput, DaemonClient, DaemonEndpoint, is_not_found};
pub use image::ensure_image;
pub use port::{exposed_tcp_ports, host_binding};
