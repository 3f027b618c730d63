//! Domain error types for the Kafka broker fixture.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.
//! Every step of the bootstrap sequence has its own variant so a failed
//! container start tells the caller exactly which operation gave up.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while starting or querying the Kafka fixture container.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The delegated container create/start call failed.
    #[error("container start: {0}")]
    Start(#[source] testcontainers::TestcontainersError),

    /// Could not construct a Docker Engine API client.
    #[error("docker client: {0}")]
    Docker(#[source] bollard::errors::Error),

    /// The container runtime never published a host-side mapping for the
    /// requested container port before the deadline.
    #[error(
        "no host mapping for container port {port} after {attempts} attempt(s) in {timeout:?} (last error: {last_error})"
    )]
    PortMappingTimeout {
        /// Container-internal port that was being resolved.
        port: u16,
        /// Number of inspection attempts performed before giving up.
        attempts: u32,
        /// Overall deadline that elapsed.
        timeout: Duration,
        /// Last error (or reason) observed by the polling loop.
        last_error: String,
    },

    /// Could not resolve the docker-host address the broker is reachable on.
    #[error("resolve container host: {0}")]
    HostResolution(#[source] testcontainers::TestcontainersError),

    /// Looking up the current host mapping of a container port failed.
    #[error("resolve host port for container port {port}: {source}")]
    PortLookup {
        port: u16,
        #[source]
        source: testcontainers::TestcontainersError,
    },

    /// Inspecting the running container failed.
    #[error("inspect container {id}: {source}")]
    ContainerInspect {
        id: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The container inspection response carried no hostname.
    #[error("container {id} reported no hostname")]
    HostnameMissing { id: String },

    /// Inspecting the image for its original entrypoint/command failed.
    #[error("inspect image '{image}': {source}")]
    ImageInspect {
        image: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The image exposes neither an entrypoint nor a command, so there is
    /// nothing for the bootstrap script to exec.
    #[error("image '{image}' has no entrypoint or command to exec")]
    ImageCommandMissing { image: String },

    /// Building the single-file tar archive for the script copy failed.
    #[error("archive start script for {path}: {source}")]
    ScriptArchive {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Copying the bootstrap script into the running container failed.
    #[error("install start script at {path}: {source}")]
    ScriptInstall {
        path: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The configured readiness pattern is not a valid regular expression.
    #[error("invalid ready-log pattern '{pattern}': {source}")]
    ReadyPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Streaming the container log failed mid-wait.
    #[error("stream container logs: {0}")]
    LogStream(#[source] bollard::errors::Error),

    /// The broker never logged its readiness line before the deadline.
    #[error("broker did not log readiness (pattern '{pattern}') within {timeout:?}")]
    ReadyLogTimeout { pattern: String, timeout: Duration },

    /// The container log stream ended (container exited) before the
    /// readiness line appeared.
    #[error("container log stream ended before readiness (pattern '{pattern}')")]
    BrokerExited { pattern: String },
}

/// Result type alias for fixture operations.
pub type Result<T> = std::result::Result<T, FixtureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_mapping_timeout_display_carries_diagnostics() {
        let err = FixtureError::PortMappingTimeout {
            port: 9093,
            attempts: 42,
            timeout: Duration::from_secs(60),
            last_error: "mapping not yet published".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("9093"));
        assert!(msg.contains("42"));
        assert!(msg.contains("mapping not yet published"));
    }

    #[test]
    fn ready_log_timeout_display_names_pattern() {
        let err = FixtureError::ReadyLogTimeout {
            pattern: "Transition from STARTING to STARTED".to_string(),
            timeout: Duration::from_secs(300),
        };
        let msg = err.to_string();
        assert!(msg.contains("Transition from STARTING to STARTED"));
        assert!(msg.contains("300"));
    }

    #[test]
    fn image_command_missing_display_names_image() {
        let err = FixtureError::ImageCommandMissing {
            image: "sha256:deadbeef".to_string(),
        };
        assert!(err.to_string().contains("sha256:deadbeef"));
    }
}
