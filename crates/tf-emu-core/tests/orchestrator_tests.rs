//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Primary orchestration and lifecycle management."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tf_emu_common::AppConfig;
use tf_emu_core::{DeviceCatalog, EmulatorOrchestrator};
use tf_emu_msg::{Envelope, HandlerId, HandlerRegistry, InMemoryBus, Transport, BROADCAST};
use tf_emu_protocol::{uid, Header, Packet, CALLBACK_ENUMERATE, FUNCTION_ENUMERATE};

const CONFIG: &str = r#"
[simulation]
random_seed = 7
generator_period_ms = 20

[[devices]]
type = "distance_ir"
uid = "abc"

[[devices]]
type = 240
uid = "q1"
connected_uid = "abc"
position = "b"

[[devices]]
type = "barometer"
uid = "off"
enabled = false
"#;

fn frame(uid_str: &str, function_id: u8, payload: &[u8]) -> Bytes {
    let header = Header::new(uid::decode(uid_str).unwrap(), function_id, 2, true);
    Packet::new(header, Bytes::copy_from_slice(payload))
        .and_then(|packet| packet.encode())
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orchestrator_starts_enabled_devices_and_stops() {
    let config: AppConfig = CONFIG.parse().unwrap();
    let bus = InMemoryBus::new();
    let registry = HandlerRegistry::new();
    let catalog = Arc::new(DeviceCatalog::builtin().unwrap());

    let handle = EmulatorOrchestrator::new(config, catalog, bus.clone(), registry.clone())
        .start()
        .await
        .unwrap();
    let keys: Vec<_> = handle.devices().map(|d| d.profile().key().to_owned()).collect();
    assert_eq!(keys, vec!["distance_ir", "hall_effect"]);
    assert!(handle.device("abc").is_some());
    assert!(handle.device("off").is_none());
    assert_eq!(bus.subscriber_count(BROADCAST), 2);

    let client = HandlerId::random();
    registry.register(client.clone());
    let mut inbox = bus.subscribe(client.as_str());

    bus.publish("abc", Envelope::from_handler(client.clone(), frame("abc", 1, &[])))
        .unwrap();
    let answer = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .unwrap()
        .unwrap();
    let packet = Packet::parse(&answer.frame).unwrap();
    assert_eq!(packet.header.function_id, 1);
    assert_eq!(packet.payload.len(), 2);

    bus.publish(BROADCAST, Envelope::from_handler(client.clone(), frame("1", FUNCTION_ENUMERATE, &[])))
        .unwrap();
    let mut announced = Vec::new();
    for _ in 0..2 {
        let envelope = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
            .await
            .unwrap()
            .unwrap();
        let packet = Packet::parse(&envelope.frame).unwrap();
        assert_eq!(packet.header.function_id, CALLBACK_ENUMERATE);
        announced.push(uid::encode(packet.header.uid));
    }
    announced.sort();
    assert_eq!(announced, vec!["abc", "q1"]);

    handle.shutdown().await.unwrap();
    assert_eq!(bus.subscriber_count("abc"), 0);
}

#[tokio::test]
async fn unknown_device_types_fail_startup() {
    let config: AppConfig = r#"
        [[devices]]
        type = "toaster"
        uid = "abc"
    "#
    .parse()
    .unwrap();
    let err = EmulatorOrchestrator::new(
        config,
        Arc::new(DeviceCatalog::builtin().unwrap()),
        InMemoryBus::new(),
        HandlerRegistry::new(),
    )
    .start()
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("toaster"));
}
