//! `testcontainers` image definition for the single-node broker.
//!
//! The image's real entrypoint is replaced with a stub shell loop that
//! blocks until the bootstrap script exists and then `exec`s it. This is
//! phase one of the two-phase start protocol: the broker must not launch
//! with default listener configuration before the dynamically assigned host
//! port is known. Phase two (the orchestrator in [`crate::bootstrap`])
//! renders and installs the script, unblocking the loop.

use std::borrow::Cow;
use std::collections::BTreeMap;

use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::Image;

use crate::config::BootstrapConfig;

/// Image request for a single-node KRaft broker.
///
/// Built by [`crate::KafkaContainerBuilder`]; the environment carries the
/// KRaft single-node defaults in both the bitnami and apache dialects, and
/// only the public listener port is exposed.
#[derive(Debug, Clone)]
pub struct KafkaImage {
    name: String,
    tag: String,
    env_vars: BTreeMap<String, String>,
    cmd: Vec<String>,
    tcp_ports: Vec<ContainerPort>,
}

impl KafkaImage {
    pub(crate) fn new(
        image: &str,
        config: &BootstrapConfig,
        extra_env: BTreeMap<String, String>,
    ) -> Self {
        let (name, tag) = split_image_ref(image);

        let mut env_vars = BTreeMap::new();
        // bitnami/kafka
        env_vars.insert("KAFKA_CFG_NODE_ID".to_string(), "0".to_string());
        env_vars.insert(
            "KAFKA_CFG_PROCESS_ROLES".to_string(),
            "controller,broker".to_string(),
        );
        // apache/kafka and apache/kafka-native
        env_vars.insert("KAFKA_NODE_ID".to_string(), "0".to_string());
        env_vars.insert(
            "KAFKA_PROCESS_ROLES".to_string(),
            "controller,broker".to_string(),
        );
        env_vars.insert(
            "KAFKA_OFFSETS_TOPIC_REPLICATION_FACTOR".to_string(),
            "1".to_string(),
        );
        env_vars.extend(extra_env);

        let cmd = vec![
            "-c".to_string(),
            format!(
                "while [ ! -f \"{path}\" ]; do sleep 0.1; done; exec \"{path}\"",
                path = config.script_path,
            ),
        ];

        Self {
            name,
            tag,
            env_vars,
            cmd,
            tcp_ports: vec![ContainerPort::Tcp(config.ports.public)],
        }
    }
}

impl Image for KafkaImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    // Readiness is handled by the bootstrap orchestrator after start; the
    // stub entrypoint logs nothing to wait on.
    fn ready_conditions(&self) -> Vec<WaitFor> {
        Vec::new()
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<Item = (impl Into<Cow<'_, str>>, impl Into<Cow<'_, str>>)> {
        &self.env_vars
    }

    fn entrypoint(&self) -> Option<&str> {
        Some("sh")
    }

    fn cmd(&self) -> impl IntoIterator<Item = impl Into<Cow<'_, str>>> {
        &self.cmd
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &self.tcp_ports
    }
}

/// Split an image reference into repository and tag, defaulting the tag to
/// `latest`. A colon inside the registry component (`registry:5000/kafka`)
/// is not a tag separator.
fn split_image_ref(image: &str) -> (String, String) {
    match image.rfind(':') {
        Some(idx) if idx > image.rfind('/').unwrap_or(0) => {
            (image[..idx].to_string(), image[idx + 1..].to_string())
        }
        _ => (image.to_string(), "latest".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(reference: &str) -> KafkaImage {
        KafkaImage::new(reference, &BootstrapConfig::default(), BTreeMap::new())
    }

    fn strings<'a>(items: impl IntoIterator<Item = impl Into<Cow<'a, str>>>) -> Vec<String> {
        items.into_iter().map(|i| i.into().into_owned()).collect()
    }

    fn env_map<'a>(
        items: impl IntoIterator<Item = (impl Into<Cow<'a, str>>, impl Into<Cow<'a, str>>)>,
    ) -> BTreeMap<String, String> {
        items
            .into_iter()
            .map(|(k, v)| (k.into().into_owned(), v.into().into_owned()))
            .collect()
    }

    #[test]
    fn image_reference_splits_into_name_and_tag() {
        assert_eq!(
            split_image_ref("apache/kafka-native:3.8.0"),
            ("apache/kafka-native".to_string(), "3.8.0".to_string())
        );
        assert_eq!(
            split_image_ref("bitnami/kafka"),
            ("bitnami/kafka".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_ref("registry:5000/team/kafka"),
            ("registry:5000/team/kafka".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn entrypoint_is_a_stub_waiting_for_the_start_script() {
        let image = image("apache/kafka:3.8.0");
        assert_eq!(image.entrypoint(), Some("sh"));
        let cmd = strings(image.cmd());
        assert_eq!(cmd[0], "-c");
        assert!(cmd[1].contains("while [ ! -f \"/usr/sbin/testcontainers_start.sh\" ]"));
        assert!(cmd[1].ends_with("exec \"/usr/sbin/testcontainers_start.sh\""));
    }

    #[test]
    fn defaults_describe_a_single_node_kraft_broker() {
        let image = image("apache/kafka:3.8.0");
        let env = env_map(image.env_vars());
        assert_eq!(env["KAFKA_NODE_ID"], "0");
        assert_eq!(env["KAFKA_CFG_NODE_ID"], "0");
        assert_eq!(env["KAFKA_PROCESS_ROLES"], "controller,broker");
        assert_eq!(env["KAFKA_OFFSETS_TOPIC_REPLICATION_FACTOR"], "1");
        assert_eq!(image.expose_ports(), &[ContainerPort::Tcp(9093)]);
    }

    #[test]
    fn stub_waits_on_the_configured_script_path() {
        let config = BootstrapConfig {
            script_path: "/tmp/kafka_start.sh".to_string(),
            ..Default::default()
        };
        let image = KafkaImage::new("apache/kafka", &config, BTreeMap::new());
        let cmd = strings(image.cmd());
        assert!(cmd[1].contains("while [ ! -f \"/tmp/kafka_start.sh\" ]"));
        assert!(cmd[1].ends_with("exec \"/tmp/kafka_start.sh\""));
    }

    #[test]
    fn caller_environment_overrides_defaults() {
        let mut extra = BTreeMap::new();
        extra.insert("KAFKA_NODE_ID".to_string(), "7".to_string());
        let image = KafkaImage::new("apache/kafka", &BootstrapConfig::default(), extra);
        let env = env_map(image.env_vars());
        assert_eq!(env["KAFKA_NODE_ID"], "7");
    }
}
