//! Port publishing helpers.

use std::collections::HashMap;

use bollard::models::ContainerInspectResponse;

use super::DaemonEndpoint;

/// Used when neither the binding nor the container network names a host address.
const LOOPBACK: &str = "127.0.0.1";

/// Builds the `ExposedPorts` map for a set of TCP ports.
#[must_use]
pub fn exposed_tcp_ports(ports: &[u16]) -> HashMap<String, HashMap<(), ()>> {
    ports
        .iter()
        .map(|port| (format!("{port}/tcp"), HashMap::new()))
        .collect()
}

/// Finds where container port `port/tcp` is published on the host.
///
/// The host address is the binding's own address when it is specific, else
/// the container's bridge gateway. Returns `None` until the container is
/// running with the port published.
#[must_use]
pub fn host_binding(inspect: &ContainerInspectResponse, port: u16) -> Option<DaemonEndpoint> {
    let settings = inspect.network_settings.as_ref()?;
    let bindings = settings.ports.as_ref()?.get(&format!("{port}/tcp"))?.as_ref()?;

    let (binding, host_port) = bindings.iter().find_map(|binding| {
        let host_port = binding.host_port.as_deref()?.parse::<u16>().ok()?;
        Some((binding, host_port))
    })?;

    let host = binding
        .host_ip
        .as_deref()
        .filter(|ip| is_specific(ip))
        .or_else(|| settings.gateway.as_deref().filter(|gw| !gw.is_empty()))
        .unwrap_or(LOOPBACK);

    Some(DaemonEndpoint::new(host, host_port))
}

fn is_specific(ip: &str) -> bool {
    !matches!(ip, "" | "0.0.0.0" | "::")
}
