//! Public handle for the single-node broker fixture.
//!
//! [`KafkaContainer::run`] starts a container from an image reference,
//! drives the bootstrap sequence and hands back a ready handle;
//! [`KafkaContainer::brokers`] reports the externally reachable bootstrap
//! address. The container is removed when the handle is dropped
//! (`testcontainers` ownership semantics), so keep the handle alive for the
//! whole test.

use std::collections::BTreeMap;

use bollard::Docker;
use testcontainers::core::ContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ContainerRequest, ImageExt};

use crate::bootstrap::bootstrap;
use crate::config::{BootstrapConfig, CommandSource, ListenerPorts};
use crate::error::{FixtureError, Result};
use crate::image::KafkaImage;

/// A running single-node Kafka broker, bootstrapped and ready for clients.
#[derive(Debug)]
pub struct KafkaContainer {
    container: ContainerAsync<KafkaImage>,
    config: BootstrapConfig,
}

impl KafkaContainer {
    /// Start a broker from `image` with default settings and wait until it
    /// is ready.
    ///
    /// Cancellation safe: dropping the returned future (for example via
    /// `tokio::time::timeout`) abandons the bootstrap and tears the
    /// container down.
    ///
    /// # Errors
    ///
    /// Returns a [`StartError`]; when the container itself was created, the
    /// error carries its handle so the caller can inspect or terminate the
    /// partially started container.
    pub async fn run(image: &str) -> std::result::Result<Self, StartError> {
        Self::builder(image).start().await
    }

    /// Start configuring a broker fixture for `image`.
    #[must_use]
    pub fn builder(image: &str) -> KafkaContainerBuilder {
        KafkaContainerBuilder {
            image: image.to_string(),
            env_vars: BTreeMap::new(),
            network: None,
            container_name: None,
            request_hooks: Vec::new(),
            config: BootstrapConfig::default(),
        }
    }

    /// Bootstrap-server addresses for clients running on the docker host.
    ///
    /// Always a single entry in `host:port` form. Host and port are
    /// re-resolved on every call; the mapping is stable for the container's
    /// lifetime but resolution legitimately fails once the container is
    /// gone.
    ///
    /// # Errors
    ///
    /// [`FixtureError::HostResolution`] or [`FixtureError::PortLookup`] when
    /// the runtime cannot resolve the address.
    pub async fn brokers(&self) -> Result<Vec<String>> {
        let host = self
            .container
            .get_host()
            .await
            .map_err(FixtureError::HostResolution)?;
        let port = self
            .container
            .get_host_port_ipv4(ContainerPort::Tcp(self.config.ports.public))
            .await
            .map_err(|source| FixtureError::PortLookup {
                port: self.config.ports.public,
                source,
            })?;
        Ok(vec![format!("{host}:{port}")])
    }

    /// Container id assigned by the runtime.
    #[must_use]
    pub fn id(&self) -> &str {
        self.container.id()
    }

    /// The underlying `testcontainers` handle, for log tailing, exec or
    /// early termination.
    #[must_use]
    pub fn container(&self) -> &ContainerAsync<KafkaImage> {
        &self.container
    }
}

type RequestHook =
    Box<dyn FnOnce(ContainerRequest<KafkaImage>) -> ContainerRequest<KafkaImage> + Send>;

/// Builder for [`KafkaContainer`], covering the customization points the
/// fixture supports without recompilation.
pub struct KafkaContainerBuilder {
    image: String,
    env_vars: BTreeMap<String, String>,
    network: Option<String>,
    container_name: Option<String>,
    request_hooks: Vec<RequestHook>,
    config: BootstrapConfig,
}

impl std::fmt::Debug for KafkaContainerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaContainerBuilder")
            .field("image", &self.image)
            .field("env_vars", &self.env_vars)
            .field("network", &self.network)
            .field("container_name", &self.container_name)
            .field("request_hooks", &self.request_hooks.len())
            .field("config", &self.config)
            .finish()
    }
}

impl KafkaContainerBuilder {
    /// Set or override a container environment variable.
    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Attach the container to a Docker network, making the
    /// PLAINTEXT_INTERNAL listener reachable for other containers on it.
    #[must_use]
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Give the container a fixed name, resolvable by other containers on
    /// the same network.
    #[must_use]
    pub fn container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    /// General escape hatch over the underlying container request; hooks
    /// run last, in registration order, and may alter any part of the
    /// request via [`testcontainers::ImageExt`].
    #[must_use]
    pub fn modify_request<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(ContainerRequest<KafkaImage>) -> ContainerRequest<KafkaImage> + Send + 'static,
    {
        self.request_hooks.push(Box::new(hook));
        self
    }

    /// Install the bootstrap script at a different in-container path.
    #[must_use]
    pub fn script_path(mut self, path: impl Into<String>) -> Self {
        self.config.script_path = path.into();
        self
    }

    /// Use non-default listener ports.
    #[must_use]
    pub fn ports(mut self, ports: ListenerPorts) -> Self {
        self.config.ports = ports;
        self
    }

    /// Choose how the broker launch command is recovered.
    #[must_use]
    pub fn command_source(mut self, command: CommandSource) -> Self {
        self.config.command = command;
        self
    }

    /// Deadline for the broker's readiness log line (default five minutes).
    #[must_use]
    pub fn startup_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    /// Deadline for the public port's host mapping (default one minute).
    #[must_use]
    pub fn port_mapping_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.port_mapping_timeout = timeout;
        self
    }

    /// Pause between port-mapping polls (default 100ms).
    #[must_use]
    pub fn poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Regex matched against log lines to detect readiness, for images with
    /// a different log format.
    #[must_use]
    pub fn ready_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.ready_pattern = pattern.into();
        self
    }

    /// Assemble the container request the runner will start.
    fn into_request(self) -> (ContainerRequest<KafkaImage>, BootstrapConfig) {
        let image = KafkaImage::new(&self.image, &self.config, self.env_vars);
        let mut request: ContainerRequest<KafkaImage> = image.into();
        if let Some(network) = self.network {
            request = request.with_network(network);
        }
        if let Some(name) = self.container_name {
            request = request.with_container_name(name);
        }
        for hook in self.request_hooks {
            request = hook(request);
        }
        (request, self.config)
    }

    /// Start the container and run the bootstrap sequence.
    ///
    /// # Errors
    ///
    /// See [`KafkaContainer::run`].
    pub async fn start(self) -> std::result::Result<KafkaContainer, StartError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| StartError::before_start(FixtureError::Docker(e)))?;

        let (request, config) = self.into_request();
        let container = request
            .start()
            .await
            .map_err(|e| StartError::before_start(FixtureError::Start(e)))?;

        match bootstrap(&docker, &container, &config).await {
            Ok(()) => Ok(KafkaContainer { container, config }),
            Err(error) => Err(StartError {
                error,
                container: Some(container),
            }),
        }
    }
}

/// Failure to produce a ready [`KafkaContainer`].
///
/// When the underlying container was created before the bootstrap failed,
/// [`StartError::container`] hands it back so the caller can collect logs or
/// terminate it; otherwise it is `None`. Dropping the error removes the
/// container.
#[derive(Debug)]
pub struct StartError {
    error: FixtureError,
    container: Option<ContainerAsync<KafkaImage>>,
}

impl StartError {
    fn before_start(error: FixtureError) -> Self {
        Self {
            error,
            container: None,
        }
    }

    /// The bootstrap failure.
    #[must_use]
    pub fn error(&self) -> &FixtureError {
        &self.error
    }

    /// The partially started container, when one exists.
    #[must_use]
    pub fn container(&self) -> Option<&ContainerAsync<KafkaImage>> {
        self.container.as_ref()
    }

    /// Split into the failure and the partially started container.
    #[must_use]
    pub fn into_parts(self) -> (FixtureError, Option<ContainerAsync<KafkaImage>>) {
        (self.error, self.container)
    }
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<StartError> for FixtureError {
    fn from(err: StartError) -> Self {
        err.error
    }
}
