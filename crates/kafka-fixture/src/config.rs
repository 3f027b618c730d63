//! Configuration for the broker bootstrap sequence.
//!
//! Everything the orchestrator needs is carried in an explicit
//! [`BootstrapConfig`] rather than package-level constants, so tests can run
//! against non-default ports or log formats without recompiling the crate.

use std::time::Duration;

/// Image used by [`crate::KafkaContainer::run`] callers that have no
/// preference. Any KRaft-capable `apache/kafka`, `apache/kafka-native` or
/// `bitnami/kafka` image works; the native build starts fastest.
pub const DEFAULT_IMAGE: &str = "apache/kafka-native:3.8.0";

/// In-container path the rendered bootstrap script is installed at. The
/// container's stub entrypoint busy-waits for this file before exec'ing it.
pub const DEFAULT_SCRIPT_PATH: &str = "/usr/sbin/testcontainers_start.sh";

/// Log line signalling the broker reached its `STARTED` state.
///
/// This is a property of the Kafka server's log format, not a guaranteed
/// contract; images with a different readiness line need
/// [`KafkaContainerBuilder::ready_pattern`](crate::KafkaContainerBuilder::ready_pattern).
pub const DEFAULT_READY_PATTERN: &str = "Transition from STARTING to STARTED";

/// Container-internal ports of the four broker listeners.
///
/// Only the public listener is published to the host (with a dynamically
/// assigned host port); the other three stay inside the container or the
/// Docker network. The four numbers must not collide with ports the image
/// itself binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerPorts {
    /// CONTROLLER listener, KRaft consensus.
    pub controller: u16,
    /// PLAINTEXT_PUBLIC listener, advertised as `host:mapped-port` for
    /// clients outside Docker.
    pub public: u16,
    /// PLAINTEXT_INTERNAL listener, advertised under the container hostname
    /// for other containers on the same network.
    pub internal: u16,
    /// PLAINTEXT_LOCALHOST listener, advertised as `localhost` and used as
    /// the inter-broker listener so broker-to-self traffic never leaves the
    /// container.
    pub localhost: u16,
}

impl Default for ListenerPorts {
    fn default() -> Self {
        Self {
            controller: 9094,
            public: 9093,
            internal: 9095,
            localhost: 9096,
        }
    }
}

/// Where the bootstrap script's final `exec` command comes from.
#[derive(Debug, Clone, Default)]
pub enum CommandSource {
    /// Inspect the container's image at bootstrap time and exec its original
    /// entrypoint plus command. Fails with
    /// [`FixtureError::ImageCommandMissing`](crate::FixtureError::ImageCommandMissing)
    /// if the image declares neither; there is deliberately no fallback.
    #[default]
    Inspect,
    /// Exec a fixed token list, skipping image inspection.
    Static(Vec<String>),
}

/// Tunables for the post-start bootstrap sequence.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Listener port assignment.
    pub ports: ListenerPorts,
    /// Absolute in-container path of the bootstrap script.
    pub script_path: String,
    /// Strategy for recovering the broker launch command.
    pub command: CommandSource,
    /// Deadline for the host-side mapping of the public port to appear.
    pub port_mapping_timeout: Duration,
    /// Fixed pause between port-mapping inspections; no backoff.
    pub poll_interval: Duration,
    /// Regular expression matched against container log lines to detect
    /// broker readiness.
    pub ready_pattern: String,
    /// Deadline for the readiness line, counted from script install.
    pub startup_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            ports: ListenerPorts::default(),
            script_path: DEFAULT_SCRIPT_PATH.to_string(),
            command: CommandSource::default(),
            port_mapping_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            ready_pattern: DEFAULT_READY_PATTERN.to_string(),
            startup_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_match_broker_image_contract() {
        let ports = ListenerPorts::default();
        assert_eq!(ports.controller, 9094);
        assert_eq!(ports.public, 9093);
        assert_eq!(ports.internal, 9095);
        assert_eq!(ports.localhost, 9096);
    }

    #[test]
    fn default_config_uses_fixed_script_path_and_bounded_waits() {
        let config = BootstrapConfig::default();
        assert_eq!(config.script_path, "/usr/sbin/testcontainers_start.sh");
        assert_eq!(config.port_mapping_timeout, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.startup_timeout, Duration::from_secs(300));
        assert!(matches!(config.command, CommandSource::Inspect));
    }
}
