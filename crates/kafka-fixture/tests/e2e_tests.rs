//! End-to-end tests against a real Docker daemon.
//!
//! These start actual broker containers and exercise them with rdkafka
//! clients. They skip themselves when no Docker socket is present so the
//! unit suite stays runnable everywhere.

use std::path::Path;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};

use kafka_fixture::{CommandSource, KafkaContainer, DEFAULT_IMAGE};

fn docker_available() -> bool {
    Path::new("/var/run/docker.sock").exists()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kafka_fixture=debug")),
        )
        .with_test_writer()
        .try_init();
}

async fn roundtrip(brokers: &str) {
    let topic = format!("fixture-test-{}", uuid::Uuid::new_v4());

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "10000")
        .create()
        .expect("create producer");

    producer
        .send(
            FutureRecord::to(&topic).key("key").payload("hello broker"),
            Duration::from_secs(10),
        )
        .await
        .expect("produce message");

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", format!("fixture-group-{}", uuid::Uuid::new_v4()))
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("create consumer");
    consumer.subscribe(&[&topic]).expect("subscribe");

    let message = tokio::time::timeout(Duration::from_secs(30), consumer.recv())
        .await
        .expect("receive within deadline")
        .expect("kafka message");
    assert_eq!(message.payload(), Some("hello broker".as_bytes()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broker_starts_and_serves_clients() {
    if !docker_available() {
        eprintln!("skipping e2e test: docker not available");
        return;
    }
    init_tracing();

    let kafka = KafkaContainer::run(DEFAULT_IMAGE).await.expect("start kafka");

    let brokers = kafka.brokers().await.expect("resolve brokers");
    assert_eq!(brokers.len(), 1, "exactly one bootstrap address");
    let (host, port) = brokers[0]
        .rsplit_once(':')
        .expect("address in host:port form");
    assert!(!host.is_empty());
    port.parse::<u16>().expect("numeric port");

    roundtrip(&brokers[0]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn static_command_variant_boots_without_image_inspection() {
    if !docker_available() {
        eprintln!("skipping e2e test: docker not available");
        return;
    }
    init_tracing();

    // apache/kafka images launch the broker via this script.
    let kafka = KafkaContainer::builder(DEFAULT_IMAGE)
        .command_source(CommandSource::Static(vec![
            "/etc/kafka/docker/run".to_string()
        ]))
        .start()
        .await
        .expect("start kafka with static command");

    let brokers = kafka.brokers().await.expect("resolve brokers");
    roundtrip(&brokers[0]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_start_returns_instead_of_hanging() {
    if !docker_available() {
        eprintln!("skipping e2e test: docker not available");
        return;
    }

    // A broker cannot possibly become ready in one second; the start future
    // must be cancelled by the timeout rather than hang until its own
    // five-minute deadline.
    let result =
        tokio::time::timeout(Duration::from_secs(1), KafkaContainer::run(DEFAULT_IMAGE)).await;
    assert!(result.is_err(), "start future should be cancelled, not ready");
}
