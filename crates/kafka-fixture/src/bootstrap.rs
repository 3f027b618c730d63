//! Post-start bootstrap orchestration.
//!
//! Runs once per container, immediately after the runtime reports the
//! container started: wait for the public port's host mapping, resolve host
//! and hostname, recover the image's original launch command, render and
//! install the bootstrap script, then block until the broker logs its
//! readiness line. Each step is bounded and failures abort the sequence with
//! a step-specific [`FixtureError`].

use std::time::Duration;

use bollard::container::{InspectContainerOptions, LogsOptions, UploadToContainerOptions};
use bollard::models::ContainerInspectResponse;
use bollard::Docker;
use futures_util::StreamExt;
use regex::Regex;
use testcontainers::ContainerAsync;
use tracing::{debug, info};

use crate::config::{BootstrapConfig, CommandSource};
use crate::error::{FixtureError, Result};
use crate::image::KafkaImage;
use crate::script::render_start_script;

/// Source of the current host-side mapping of a container port.
///
/// Seam between the polling loop and the container runtime, so the loop is
/// testable without a daemon.
pub(crate) trait PortSource {
    async fn host_port(&self, container_port: u16) -> Result<Option<u16>>;
}

/// [`PortSource`] backed by Docker container inspection.
pub(crate) struct DockerPortSource<'a> {
    docker: &'a Docker,
    id: &'a str,
}

impl PortSource for DockerPortSource<'_> {
    async fn host_port(&self, container_port: u16) -> Result<Option<u16>> {
        let inspect = self
            .docker
            .inspect_container(self.id, None::<InspectContainerOptions>)
            .await
            .map_err(|source| FixtureError::ContainerInspect {
                id: self.id.to_string(),
                source,
            })?;
        Ok(published_port(&inspect, container_port))
    }
}

/// Extract the host port published for `container_port`, if any.
fn published_port(inspect: &ContainerInspectResponse, container_port: u16) -> Option<u16> {
    inspect
        .network_settings
        .as_ref()?
        .ports
        .as_ref()?
        .get(&format!("{container_port}/tcp"))?
        .as_ref()?
        .iter()
        .find_map(|binding| binding.host_port.as_deref()?.parse().ok())
}

/// Poll `source` until `port` has a host-side mapping.
///
/// One query per `interval`, fixed pacing, no backoff; the mapping is
/// assigned asynchronously by the runtime shortly after start, so a short
/// bounded retry loop is deliberate here. The whole loop runs under one
/// deadline, so a runtime query that never answers is abandoned when
/// `timeout` elapses rather than blocking the waiter.
///
/// # Errors
///
/// [`FixtureError::PortMappingTimeout`] carrying the attempt count and the
/// last observed error once the deadline elapses.
pub(crate) async fn wait_for_mapped_port<S: PortSource>(
    source: &S,
    port: u16,
    timeout: Duration,
    interval: Duration,
) -> Result<u16> {
    let mut attempts: u32 = 0;
    let mut last_error = String::from("runtime query still in flight");

    let poll = async {
        loop {
            attempts += 1;
            match source.host_port(port).await {
                Ok(Some(host_port)) => break host_port,
                Ok(None) => last_error = String::from("mapping not yet published"),
                Err(err) => last_error = err.to_string(),
            }
            tokio::time::sleep(interval).await;
        }
    };

    let resolved = tokio::time::timeout(timeout, poll).await;
    match resolved {
        Ok(host_port) => {
            debug!(port, host_port, attempts, "host port mapping resolved");
            Ok(host_port)
        }
        Err(_) => Err(FixtureError::PortMappingTimeout {
            port,
            attempts,
            timeout,
            last_error,
        }),
    }
}

/// Recover the image's original entrypoint plus command via image inspection.
///
/// # Errors
///
/// [`FixtureError::ImageInspect`] if the inspection call fails and
/// [`FixtureError::ImageCommandMissing`] if the image declares neither an
/// entrypoint nor a command; there is no fallback to defaults.
async fn image_command(docker: &Docker, image: &str) -> Result<Vec<String>> {
    let inspect =
        docker
            .inspect_image(image)
            .await
            .map_err(|source| FixtureError::ImageInspect {
                image: image.to_string(),
                source,
            })?;

    let config = inspect.config.unwrap_or_default();
    let mut tokens = config.entrypoint.unwrap_or_default();
    tokens.extend(config.cmd.unwrap_or_default());
    if tokens.is_empty() {
        return Err(FixtureError::ImageCommandMissing {
            image: image.to_string(),
        });
    }
    Ok(tokens)
}

/// Copy the rendered script into the running container at `path`, mode 0755.
///
/// A single tar upload; on failure the container-start flow is aborted, no
/// partial-write recovery is attempted.
pub(crate) async fn install_start_script(
    docker: &Docker,
    id: &str,
    path: &str,
    content: &str,
) -> Result<()> {
    let archive =
        script_archive(path, content).map_err(|source| FixtureError::ScriptArchive {
            path: path.to_string(),
            source,
        })?;

    docker
        .upload_to_container(
            id,
            Some(UploadToContainerOptions {
                path: "/",
                ..Default::default()
            }),
            archive.into(),
        )
        .await
        .map_err(|source| FixtureError::ScriptInstall {
            path: path.to_string(),
            source,
        })
}

/// Build a single-entry tar archive holding the executable script.
fn script_archive(path: &str, content: &str) -> std::io::Result<Vec<u8>> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, path.trim_start_matches('/'), content.as_bytes())?;
    builder.into_inner()
}

/// Tail the container log until a line matches `pattern`.
///
/// # Errors
///
/// [`FixtureError::ReadyLogTimeout`] when `timeout` elapses first and
/// [`FixtureError::BrokerExited`] when the log stream ends without a match.
pub(crate) async fn wait_for_ready_log(
    docker: &Docker,
    id: &str,
    pattern: &Regex,
    timeout: Duration,
) -> Result<()> {
    let mut stream = docker.logs(
        id,
        Some(LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        }),
    );

    let scan = async {
        let mut pending = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FixtureError::LogStream)?;
            pending.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
            while let Some(end) = pending.find('\n') {
                let line: String = pending.drain(..=end).collect();
                if pattern.is_match(&line) {
                    return Ok(());
                }
            }
        }
        Err(FixtureError::BrokerExited {
            pattern: pattern.as_str().to_string(),
        })
    };

    match tokio::time::timeout(timeout, scan).await {
        Ok(result) => result,
        Err(_) => Err(FixtureError::ReadyLogTimeout {
            pattern: pattern.as_str().to_string(),
            timeout,
        }),
    }
}

/// Run the full post-start bootstrap sequence against a started container.
pub(crate) async fn bootstrap(
    docker: &Docker,
    container: &ContainerAsync<KafkaImage>,
    config: &BootstrapConfig,
) -> Result<()> {
    let pattern =
        Regex::new(&config.ready_pattern).map_err(|source| FixtureError::ReadyPattern {
            pattern: config.ready_pattern.clone(),
            source,
        })?;

    let id = container.id();
    debug!(id, port = config.ports.public, "waiting for host port mapping");
    let port_source = DockerPortSource { docker, id };
    let public_host_port = wait_for_mapped_port(
        &port_source,
        config.ports.public,
        config.port_mapping_timeout,
        config.poll_interval,
    )
    .await?;

    let host = container
        .get_host()
        .await
        .map_err(FixtureError::HostResolution)?
        .to_string();

    let inspect = docker
        .inspect_container(id, None::<InspectContainerOptions>)
        .await
        .map_err(|source| FixtureError::ContainerInspect {
            id: id.to_string(),
            source,
        })?;
    let hostname = inspect
        .config
        .as_ref()
        .and_then(|c| c.hostname.clone())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FixtureError::HostnameMissing { id: id.to_string() })?;

    let command = match &config.command {
        CommandSource::Static(tokens) => tokens.clone(),
        CommandSource::Inspect => {
            let image = inspect.image.clone().unwrap_or_default();
            image_command(docker, &image).await?
        }
    };

    let script = render_start_script(
        &command,
        &config.ports,
        &host,
        &hostname,
        public_host_port,
    );
    install_start_script(docker, id, &config.script_path, &script).await?;
    debug!(id, path = %config.script_path, "start script installed");

    wait_for_ready_log(docker, id, &pattern, config.startup_timeout).await?;
    info!(id, %host, port = public_host_port, "kafka broker ready");
    Ok(())
}
