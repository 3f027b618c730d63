//! Single-node Kafka broker fixture for Docker-based integration tests.
//!
//! Starts a KRaft-mode broker in a container, rewrites its listener
//! configuration around the dynamically assigned host port, waits for the
//! broker to report readiness and exposes the reachable bootstrap address.
//! Container lifecycle is delegated to `testcontainers`; the handful of
//! operations it does not expose (image inspection, copying into a running
//! container, raw log streaming) go straight to the Docker Engine API via
//! `bollard`.
//!
//! The broker is reachable from three vantage points: the docker host
//! (public listener on a published port), other containers on the same
//! network (internal listener under the container hostname) and the
//! container itself (localhost listener, also used for inter-broker
//! traffic).
//!
//! # Two-phase start
//!
//! The image's entrypoint is replaced with a stub that blocks until a
//! bootstrap script exists, then `exec`s it. After the container starts,
//! the orchestrator waits for the public port's host mapping, renders the
//! listener environment, installs the script (unblocking the stub) and
//! tails the log until the broker transitions to its started state. Without
//! the stub the broker would race ahead with default listeners before the
//! host port is known.
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_fixture::{KafkaContainer, DEFAULT_IMAGE};
//!
//! #[tokio::test]
//! async fn produces_and_consumes() {
//!     let kafka = KafkaContainer::run(DEFAULT_IMAGE).await.expect("start kafka");
//!     let brokers = kafka.brokers().await.expect("resolve brokers");
//!     // point your Kafka client at brokers[0]
//! }
//! ```

#![forbid(unsafe_code)]

mod bootstrap;
pub mod config;
mod container;
pub mod error;
mod image;
mod script;

pub use config::{
    BootstrapConfig, CommandSource, ListenerPorts, DEFAULT_IMAGE, DEFAULT_READY_PATTERN,
    DEFAULT_SCRIPT_PATH,
};
pub use container::{KafkaContainer, KafkaContainerBuilder, StartError};
pub use error::{FixtureError, Result};
pub use image::KafkaImage;
pub use script::render_start_script;
