//! Shared test fixtures: an in-memory daemon that records every call.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bollard::container::{Config, ListContainersOptions, RemoveContainerOptions};
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, EndpointSettings,
    NetworkSettings, PortBinding, SystemVersion,
};
use bollard::network::CreateNetworkOptions;
use bollard::volume::CreateVolumeOptions;
use bytes::Bytes;
use pls::docker::{CommandOutput, DaemonClient, DaemonEndpoint, archive};
use pls::error::DockerError;
use pls::sandbox::RegistryCaSource;

pub const FAKE_PROXY_CA: &[u8] = b"-----BEGIN CERTIFICATE-----\nmitm\n-----END CERTIFICATE-----\n";
pub const FAKE_REGISTRY_CA: &[u8] =
    b"-----BEGIN CERTIFICATE-----\nregistry\n-----END CERTIFICATE-----\n";

/// Host port the fake publishes 2375/tcp on.
pub const PUBLISHED_PORT: u16 = 32768;
pub const GATEWAY: &str = "172.17.0.1";

pub fn server_error(status_code: u16, message: &str) -> DockerError {
    DockerError::DockerResponseServerError {
        status_code,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub networks: Vec<String>,
    pub running: bool,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub privileged: bool,
}

/// A file extracted by `copy_to_container`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub container: String,
    pub directory: String,
    pub file_name: String,
    pub contents: Vec<u8>,
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    containers: Vec<FakeContainer>,
    networks: HashMap<String, HashMap<String, String>>,
    volumes: Vec<String>,
    images: HashSet<String>,
    staged: Vec<StagedFile>,
    ca_misses: u32,
    ping_failures: u32,
    login_exit_code: i64,
    inspect_errors: HashMap<String, (u16, String)>,
    exec_error: Option<(u16, String)>,
}

impl State {
    fn find(&self, id_or_name: &str) -> Option<&FakeContainer> {
        self.containers
            .iter()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
    }

    fn find_mut(&mut self, id_or_name: &str) -> Option<&mut FakeContainer> {
        self.containers
            .iter_mut()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
    }
}

/// In-memory daemon. Clones share state, so the "inner" client returned by
/// `connect` records into the same call log.
#[derive(Clone, Default)]
pub struct FakeDaemon {
    state: Arc<Mutex<State>>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `images` already present so no pull happens.
    pub fn with_images(self, images: &[&str]) -> Self {
        self.lock()
            .images
            .extend(images.iter().map(|i| i.to_string()));
        self
    }

    /// The proxy CA is missing for the first `misses` copy attempts.
    pub fn with_ca_misses(self, misses: u32) -> Self {
        self.lock().ca_misses = misses;
        self
    }

    /// The first `failures` pings fail.
    pub fn with_ping_failures(self, failures: u32) -> Self {
        self.lock().ping_failures = failures;
        self
    }

    pub fn with_login_exit_code(self, exit_code: i64) -> Self {
        self.lock().login_exit_code = exit_code;
        self
    }

    /// Inspecting `name` fails with the given server error.
    pub fn with_inspect_error(self, name: &str, status_code: u16, message: &str) -> Self {
        self.lock()
            .inspect_errors
            .insert(name.to_string(), (status_code, message.to_string()));
        self
    }

    /// Every exec fails with the given server error before running.
    pub fn with_exec_error(self, status_code: u16, message: &str) -> Self {
        self.lock().exec_error = Some((status_code, message.to_string()));
        self
    }

    /// Adds a container that was not created through pls calls.
    pub fn seed_container(&self, name: &str, labels: &[(&str, &str)]) -> String {
        let id = format!("{name}-id");
        self.lock().containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            image: String::from("busybox"),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        });
        id
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Index of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lock().calls.iter().position(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn container(&self, id_or_name: &str) -> Option<FakeContainer> {
        self.lock().find(id_or_name).cloned()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.lock().containers.iter().map(|c| c.name.clone()).collect()
    }

    pub fn staged(&self) -> Vec<StagedFile> {
        self.lock().staged.clone()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.lock().networks.contains_key(name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.lock().volumes.iter().any(|v| v == name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake daemon state poisoned")
    }

    fn record(&self, call: String) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl DaemonClient for FakeDaemon {
    async fn ping(&self) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(String::from("ping"));
        if state.ping_failures > 0 {
            state.ping_failures -= 1;
            return Err(server_error(500, "daemon starting"));
        }
        Ok(())
    }

    async fn version(&self) -> Result<SystemVersion, DockerError> {
        self.record(String::from("version"));
        Ok(SystemVersion {
            version: Some(String::from("27.3.1")),
            api_version: Some(String::from("1.47")),
            os: Some(String::from("linux")),
            arch: Some(String::from("amd64")),
            ..Default::default()
        })
    }

    async fn inspect_image(&self, image: &str) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("inspect_image {image}"));
        if state.images.contains(image) {
            Ok(())
        } else {
            Err(server_error(404, "No such image"))
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("pull_image {image}"));
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("create_container {name}"));
        if state.find(name).is_some() {
            return Err(server_error(409, "Conflict"));
        }

        let id = format!("{name}-id");
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            image: config.image.unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
            networks: Vec::new(),
            running: false,
            entrypoint: config.entrypoint.unwrap_or_default(),
            cmd: config.cmd.unwrap_or_default(),
            privileged: config
                .host_config
                .and_then(|h| h.privileged)
                .unwrap_or(false),
        });
        Ok(ContainerCreateResponse {
            id,
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("start_container {id}"));
        match state.find_mut(id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(server_error(404, "No such container")),
        }
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("inspect_container {id}"));
        if let Some((status_code, message)) = state.inspect_errors.get(id) {
            return Err(server_error(*status_code, message));
        }
        let container = state
            .find(id)
            .ok_or_else(|| server_error(404, "No such container"))?;

        let networks = container
            .networks
            .iter()
            .map(|n| (n.clone(), EndpointSettings::default()))
            .collect();
        let ports = container.running.then(|| {
            HashMap::from([(
                String::from("2375/tcp"),
                Some(vec![PortBinding {
                    host_ip: Some(String::from("0.0.0.0")),
                    host_port: Some(PUBLISHED_PORT.to_string()),
                }]),
            )])
        });

        Ok(ContainerInspectResponse {
            id: Some(container.id.clone()),
            name: Some(format!("/{}", container.name)),
            network_settings: Some(NetworkSettings {
                networks: Some(networks),
                ports,
                gateway: Some(String::from(GATEWAY)),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn list_containers(
        &self,
        options: ListContainersOptions<String>,
    ) -> Result<Vec<ContainerSummary>, DockerError> {
        let mut state = self.lock();
        state.calls.push(String::from("list_containers"));
        let selectors = options.filters.get("label").cloned().unwrap_or_default();

        Ok(state
            .containers
            .iter()
            .filter(|c| {
                selectors.iter().all(|selector| {
                    let (key, value) = selector.split_once('=').unwrap_or((selector.as_str(), ""));
                    c.labels.get(key).is_some_and(|v| v == value)
                })
            })
            .map(|c| ContainerSummary {
                id: Some(c.id.clone()),
                names: Some(vec![format!("/{}", c.name)]),
                image: Some(c.image.clone()),
                labels: Some(c.labels.clone()),
                status: Some(String::from(if c.running { "Up" } else { "Created" })),
                ..Default::default()
            })
            .collect())
    }

    async fn remove_container(
        &self,
        id: &str,
        options: RemoveContainerOptions,
    ) -> Result<(), DockerError> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("remove_container {id} force={}", options.force));
        let before = state.containers.len();
        state.containers.retain(|c| c.id != id && c.name != id);
        if state.containers.len() == before {
            return Err(server_error(404, "No such container"));
        }
        Ok(())
    }

    async fn create_network(
        &self,
        options: CreateNetworkOptions<String>,
    ) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("create_network {}", options.name));
        if state.networks.contains_key(&options.name) {
            return Err(server_error(409, "network already exists"));
        }
        state.networks.insert(options.name, options.labels);
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), DockerError> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("connect_network {network} {container}"));
        if !state.networks.contains_key(network) {
            return Err(server_error(404, "network not found"));
        }
        let container = state
            .find_mut(container)
            .ok_or_else(|| server_error(404, "No such container"))?;
        container.networks.push(network.to_string());
        Ok(())
    }

    async fn prune_networks(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<String>, DockerError> {
        let mut state = self.lock();
        state.calls.push(String::from("prune_networks"));
        let selectors = filters.get("label").cloned().unwrap_or_default();

        let in_use: HashSet<String> = state
            .containers
            .iter()
            .flat_map(|c| c.networks.iter().cloned())
            .collect();
        let mut pruned: Vec<String> = state
            .networks
            .iter()
            .filter(|(name, labels)| {
                !in_use.contains(*name)
                    && selectors.iter().all(|selector| {
                        let (key, value) = selector.split_once('=').unwrap_or((selector.as_str(), ""));
                        labels.get(key).is_some_and(|v| v == value)
                    })
            })
            .map(|(name, _)| name.clone())
            .collect();
        pruned.sort();
        for name in &pruned {
            state.networks.remove(name);
        }
        Ok(pruned)
    }

    async fn create_volume(&self, options: CreateVolumeOptions<String>) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("create_volume {}", options.name));
        state.volumes.push(options.name);
        Ok(())
    }

    async fn copy_from_container(&self, id: &str, path: &str) -> Result<Bytes, DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("copy_from_container {id} {path}"));
        if state.find(id).is_none() {
            return Err(server_error(404, "No such container"));
        }
        if state.ca_misses > 0 {
            state.ca_misses -= 1;
            return Err(server_error(404, "Could not find the file"));
        }
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let archive = archive::single_file(file_name, FAKE_PROXY_CA).expect("build archive");
        Ok(Bytes::from(archive))
    }

    async fn copy_to_container(
        &self,
        id: &str,
        path: &str,
        archive: Bytes,
    ) -> Result<(), DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("copy_to_container {id} {path}"));
        if state.find(id).is_none() {
            return Err(server_error(404, "No such container"));
        }

        let mut archive = tar::Archive::new(archive.as_ref());
        for entry in archive.entries().expect("read archive") {
            let mut entry = entry.expect("read entry");
            let file_name = entry
                .path()
                .expect("entry path")
                .to_string_lossy()
                .into_owned();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).expect("read contents");
            state.staged.push(StagedFile {
                container: id.to_string(),
                directory: path.to_string(),
                file_name,
                contents,
            });
        }
        Ok(())
    }

    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<CommandOutput, DockerError> {
        let mut state = self.lock();
        state.calls.push(format!("exec {id} {}", cmd.join(" ")));
        if let Some((status_code, message)) = &state.exec_error {
            return Err(server_error(*status_code, message));
        }
        let exit_code = state.login_exit_code;
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                String::from("Error response from daemon: unauthorized")
            },
            exit_code,
        })
    }

    fn connect(&self, endpoint: &DaemonEndpoint) -> Result<Arc<dyn DaemonClient>, DockerError> {
        self.record(format!("connect {endpoint}"));
        Ok(Arc::new(self.clone()))
    }
}

/// Registry CA source that returns a fixed certificate and remembers the
/// addresses it was asked for.
#[derive(Default)]
pub struct StaticRegistryCa {
    pub requested: Mutex<Vec<String>>,
}

#[async_trait]
impl RegistryCaSource for StaticRegistryCa {
    async fn fetch(&self, address: &str) -> pls::Result<Vec<u8>> {
        self.requested
            .lock()
            .expect("registry CA state poisoned")
            .push(address.to_string());
        Ok(FAKE_REGISTRY_CA.to_vec())
    }
}
