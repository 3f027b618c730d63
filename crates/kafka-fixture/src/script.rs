//! Rendering of the in-container bootstrap script.
//!
//! The script exports the multi-listener broker environment and then `exec`s
//! the image's original entrypoint and command, so the broker process
//! replaces the shell and keeps its signal and exit-code semantics. The
//! rendering is a pure function of its inputs: identical host, hostname,
//! port and command values always produce byte-identical output.
//!
//! Both the bitnami (`KAFKA_CFG_*`) and apache/apache-native (`KAFKA_*`)
//! environment dialects are emitted, so one script works across the
//! supported single-node images.

use crate::config::ListenerPorts;

/// Render the bootstrap script installed into the container.
///
/// `command` is the broker launch command, one argument per token; each
/// token is individually shell-quoted, so arguments containing spaces or
/// shell metacharacters survive intact. `host` is the docker-host address
/// the public listener is advertised under and `public_host_port` its
/// dynamically assigned host-side port; `hostname` is the container's
/// hostname advertised on the internal listener.
pub fn render_start_script(
    command: &[String],
    ports: &ListenerPorts,
    host: &str,
    hostname: &str,
    public_host_port: u16,
) -> String {
    let advertised = format!(
        "PLAINTEXT_PUBLIC://{host}:{public_host_port},PLAINTEXT_INTERNAL://{hostname}:{internal},PLAINTEXT_LOCALHOST://localhost:{localhost}",
        internal = ports.internal,
        localhost = ports.localhost,
    );
    let protocol_map =
        "CONTROLLER:PLAINTEXT,PLAINTEXT_PUBLIC:PLAINTEXT,PLAINTEXT_INTERNAL:PLAINTEXT,PLAINTEXT_LOCALHOST:PLAINTEXT";
    let listeners = format!(
        "CONTROLLER://:{controller},PLAINTEXT_PUBLIC://:{public},PLAINTEXT_INTERNAL://:{internal},PLAINTEXT_LOCALHOST://localhost:{localhost}",
        controller = ports.controller,
        public = ports.public,
        internal = ports.internal,
        localhost = ports.localhost,
    );
    let exec_line = command
        .iter()
        .map(|token| quote(token))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "#!/bin/bash\n\
         # bitnami/kafka\n\
         export KAFKA_CFG_ADVERTISED_LISTENERS='{advertised}'\n\
         export KAFKA_CFG_LISTENER_SECURITY_PROTOCOL_MAP='{protocol_map}'\n\
         export KAFKA_CFG_CONTROLLER_LISTENER_NAMES=CONTROLLER\n\
         export KAFKA_CFG_INTER_BROKER_LISTENER_NAME=PLAINTEXT_LOCALHOST\n\
         # apache/kafka and apache/kafka-native\n\
         export KAFKA_ADVERTISED_LISTENERS='{advertised}'\n\
         export KAFKA_LISTENER_SECURITY_PROTOCOL_MAP='{protocol_map}'\n\
         export KAFKA_CONTROLLER_LISTENER_NAMES=CONTROLLER\n\
         export KAFKA_INTER_BROKER_LISTENER_NAME=PLAINTEXT_LOCALHOST\n\
         # shared by all supported images\n\
         export KAFKA_LISTENERS='{listeners}'\n\
         export KAFKA_CONTROLLER_QUORUM_VOTERS='0@localhost:{controller}'\n\
         # run the image's original entrypoint and command\n\
         exec {exec_line}\n",
        controller = ports.controller,
    )
}

/// POSIX single-quote a token: `'` becomes `'\''`, everything else is
/// literal inside the quotes.
fn quote(token: &str) -> String {
    format!("'{}'", token.replace('\'', r"'\''"))
}
