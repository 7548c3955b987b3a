//! Node integration tests
//!
//! Registration, round trips between nodes, and shutdown behaviour on an
//! in-process loopback bus

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

use robin::codec::Float64;
use robin::config::{default_bridges, Config, TransportKind};
use robin::node::{NativeStore, NativeWriter, Node, NodeOptions, Phase, ShutdownToken};
use robin::registrar::register_bridges;
use robin::transport::{LoopbackBus, Transport};
use robin::value::{NativeValue, ValueKind};
use robin::{BridgeError, Direction, Registrar};

fn node_on(bus: &LoopbackBus, name: &str) -> Node {
    let (transport, incoming) = bus.attach();
    Node::new(NodeOptions::new(name), Arc::new(transport), incoming)
}

#[tokio::test]
async fn test_default_registration_is_complete() {
    let bus = LoopbackBus::new();
    let mut node = node_on(&bus, "robin");
    register_bridges(&mut node, &default_bridges()).await.unwrap();

    let bridges = node.bridges();
    assert_eq!(bridges.len(), 2);

    assert_eq!(bridges[0].channel, "double_to_codesys");
    assert_eq!(bridges[0].direction, Direction::Inbound);
    assert_eq!(bridges[1].channel, "double_to_ros");
    assert_eq!(bridges[1].direction, Direction::Outbound);

    for bridge in &bridges {
        assert_eq!(bridge.native_type, ValueKind::F64);
        assert_eq!(bridge.wire_type, "std_msgs/Float64");
    }

    // Inbound subscribes, outbound advertises, nothing else
    let topics = bus.topics();
    assert_eq!(topics.len(), 2);
    let codesys = topics.iter().find(|t| t.channel == "double_to_codesys").unwrap();
    assert_eq!((codesys.publishers, codesys.subscribers), (0, 1));
    let ros = topics.iter().find(|t| t.channel == "double_to_ros").unwrap();
    assert_eq!((ros.publishers, ros.subscribers), (1, 0));
    assert_eq!(ros.type_name, Some("std_msgs/Float64"));
}

/// Two nodes: `plc` publishes on `double_to_ros`, `peer` listens on it
async fn round_trip_pair(bus: &LoopbackBus) -> (NativeWriter, NativeStore, ShutdownToken) {
    let mut plc = node_on(bus, "robin");
    plc.register_outbound::<f64, Float64>("double_to_ros")
        .await
        .unwrap();

    let mut peer = node_on(bus, "peer");
    peer.register_inbound::<f64, Float64>("double_to_ros")
        .await
        .unwrap();

    let writer = plc.writer();
    let store = peer.store();
    let shutdown = ShutdownToken::new();
    tokio::spawn(plc.spin(shutdown.clone()));
    tokio::spawn(peer.spin(shutdown.clone()));

    (writer, store, shutdown)
}

#[tokio::test]
async fn test_float64_round_trip_is_bit_exact() {
    let bus = LoopbackBus::new();
    let (writer, store, shutdown) = round_trip_pair(&bus).await;
    let mut updates = store.subscribe();

    let values = [
        0.0,
        -0.0,
        1.0 / 3.0,
        -273.15,
        f64::MAX,
        f64::MIN_POSITIVE,
        5e-324,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NAN,
        f64::from_bits(0xfff4_0000_0000_0001),
    ];

    for v in values {
        assert_ok!(writer.write("double_to_ros", v).await);
        let update = timeout(Duration::from_secs(1), updates.recv())
            .await
            .expect("value should arrive")
            .unwrap();

        match update.value {
            NativeValue::F64(received) => assert_eq!(received.to_bits(), v.to_bits()),
            other => panic!("unexpected value {:?}", other),
        }
    }

    let entry = store.get("double_to_ros").await.unwrap();
    assert_eq!(entry.messages, values.len() as u64);
    shutdown.cancel();
}

#[tokio::test]
async fn test_outbound_does_not_consume() {
    let bus = LoopbackBus::new();
    let mut node = node_on(&bus, "robin");
    register_bridges(&mut node, &default_bridges()).await.unwrap();
    let store = node.store();
    let shutdown = ShutdownToken::new();
    let spin = tokio::spawn(node.spin(shutdown.clone()));

    // Another participant publishing on the outbound channel reaches no one
    let (other, _rx) = bus.attach();
    other.publish("double_to_ros", vec![0; 8]).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.get("double_to_ros").await.unwrap().messages, 0);

    shutdown.cancel();
    spin.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_spin_runs_until_cancelled() {
    let bus = LoopbackBus::new();
    let mut node = node_on(&bus, "robin");
    register_bridges(&mut node, &default_bridges()).await.unwrap();
    let mut phase = node.phase();
    assert_eq!(*phase.borrow(), Phase::Registering);

    let shutdown = ShutdownToken::new();
    let spin = tokio::spawn(node.spin(shutdown.clone()));

    timeout(Duration::from_secs(1), phase.wait_for(|p| *p == Phase::Running))
        .await
        .expect("node should start running")
        .unwrap();

    // Still running with nothing to do
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!spin.is_finished());

    shutdown.cancel();
    timeout(Duration::from_secs(1), spin)
        .await
        .expect("spin should return after cancellation")
        .unwrap()
        .unwrap();
    assert_eq!(*phase.borrow(), Phase::Terminated);
}

#[tokio::test]
async fn test_conflicting_registration_is_rejected() {
    let bus = LoopbackBus::new();
    let mut node = node_on(&bus, "robin");
    register_bridges(&mut node, &default_bridges()).await.unwrap();

    let err = node
        .register_inbound::<f64, Float64>("double_to_ros")
        .await
        .unwrap_err();
    match err {
        BridgeError::ChannelInUse { channel, existing } => {
            assert_eq!(channel, "double_to_ros");
            assert_eq!(existing, Direction::Outbound);
        }
        other => panic!("unexpected error {:?}", other),
    }

    // Same direction is a collision too
    assert!(node
        .register_inbound::<f64, Float64>("double_to_codesys")
        .await
        .is_err());
    assert_eq!(node.bridges().len(), 2);
}

#[tokio::test]
async fn test_registrar_runs_and_stops() {
    let mut config = Config::default();
    config.transport.kind = TransportKind::Loopback;
    config.server.enabled = false;

    let shutdown = ShutdownToken::new();
    let registrar = Registrar::new(config, ["robin"]);
    let run = tokio::spawn(registrar.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!run.is_finished());

    shutdown.cancel();
    timeout(Duration::from_secs(1), run)
        .await
        .expect("registrar should stop")
        .unwrap()
        .unwrap();
}

/// Plain HTTP/1.1 GET, retried until the server accepts connections
async fn http_get(port: u16, path: &str) -> String {
    let mut stream = None;
    for _ in 0..50 {
        if let Ok(s) = TcpStream::connect(("127.0.0.1", port)).await {
            stream = Some(s);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut stream = stream.expect("API server should accept connections");

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_registrar_serves_api_and_stops() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut config = Config::default();
    config.transport.kind = TransportKind::Loopback;
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;

    let shutdown = ShutdownToken::new();
    let run = tokio::spawn(Registrar::new(config, ["robin"]).run(shutdown.clone()));

    let health = http_get(port, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"), "{}", health);
    assert!(health.contains("\"node\":\"robin\""));

    let metrics = http_get(port, "/metrics").await;
    assert!(metrics.starts_with("HTTP/1.1 200"), "{}", metrics);

    shutdown.cancel();
    let result = timeout(Duration::from_secs(2), run)
        .await
        .expect("registrar should stop")
        .unwrap();
    assert_ok!(result);
}

#[tokio::test]
async fn test_registrar_fails_on_collision() {
    let mut config = Config::default();
    config.transport.kind = TransportKind::Loopback;
    config.server.enabled = false;

    // Distinct names that resolve to the same channel
    let registrar = Registrar::new(config, ["robin", "double_to_ros:=double_to_codesys"]);
    let err = assert_err!(registrar.run(ShutdownToken::new()).await);
    assert!(err.to_string().contains("Failed to register bridges"));
}
