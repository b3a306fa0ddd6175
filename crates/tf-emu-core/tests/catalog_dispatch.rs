//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::sync::Arc;

use bytes::Bytes;
use tf_emu_core::{DeviceCatalog, DeviceRuntime, FunctionKind, RuntimeOptions};
use tf_emu_msg::{HandlerRegistry, InMemoryBus};
use tf_emu_protocol::{uid, FieldDescriptor, Header, Packet, FUNCTION_GET_IDENTITY};

fn width(fields: &[FieldDescriptor]) -> usize {
    fields.iter().map(FieldDescriptor::width).sum()
}

#[tokio::test(start_paused = true)]
async fn every_builtin_function_is_dispatched() {
    let catalog = DeviceCatalog::builtin().expect("builtin catalog");
    let bus = InMemoryBus::new();
    let uid_value = uid::decode("6Jm1D").unwrap();

    for profile in catalog.iter() {
        let runtime = DeviceRuntime::new(
            Arc::clone(profile),
            RuntimeOptions::new("6Jm1D"),
            Arc::new(bus.clone()),
            HandlerRegistry::new(),
        )
        .unwrap();

        assert!(profile.table().ids().contains(&FUNCTION_GET_IDENTITY));
        for function in &profile.device().functions {
            let payload = Bytes::from(vec![0u8; width(&function.inputs)]);
            let frame = Packet::new(Header::new(uid_value, function.id, 3, true), payload)
                .and_then(|packet| packet.encode())
                .unwrap();
            let answer = runtime.handle_inbound(&frame);

            if function.kind == FunctionKind::NotImplemented {
                assert!(answer.is_none(), "{}::{} answered", profile.key(), function.name);
                continue;
            }
            let answer = answer.unwrap_or_else(|| panic!("{}::{} unanswered", profile.key(), function.name));
            let packet = Packet::parse(&answer).unwrap();
            assert_eq!(packet.header.function_id, function.id);
            assert_eq!(packet.header.sequence_number(), 3);
            assert_eq!(
                packet.payload.len(),
                width(&function.outputs),
                "{}::{} payload size",
                profile.key(),
                function.name
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn identity_reports_the_catalog_versions() {
    let catalog = DeviceCatalog::builtin().unwrap();
    let profile = catalog.get("barometer").unwrap();
    let mut options = RuntimeOptions::new("xyz");
    options.connected_uid = Some("6Jm1D".into());
    options.position = Some('c');
    let runtime = DeviceRuntime::new(
        Arc::clone(profile),
        options,
        Arc::new(InMemoryBus::new()),
        HandlerRegistry::new(),
    )
    .unwrap();

    let frame = Packet::new(
        Header::new(runtime.numeric_uid(), FUNCTION_GET_IDENTITY, 1, true),
        Bytes::new(),
    )
    .and_then(|packet| packet.encode())
    .unwrap();
    let answer = Packet::parse(&runtime.handle_inbound(&frame).unwrap()).unwrap();
    let identity = tf_emu_protocol::Identity::decode(&answer.payload).unwrap();
    assert_eq!(identity.uid, "xyz");
    assert_eq!(identity.connected_uid, "6Jm1D");
    assert_eq!(identity.position, 'c');
    assert_eq!(identity.firmware_version, [2, 0, 1]);
    assert_eq!(identity.device_identifier, 221);
}

#[tokio::test(start_paused = true)]
async fn composite_getter_concatenates_slots() {
    let catalog = DeviceCatalog::builtin().unwrap();
    let profile = catalog.get("imu").unwrap();
    let runtime = DeviceRuntime::new(
        Arc::clone(profile),
        RuntimeOptions::new("imu1"),
        Arc::new(InMemoryBus::new()),
        HandlerRegistry::new(),
    )
    .unwrap();
    let request = |function_id: u8| {
        let frame = Packet::new(Header::new(runtime.numeric_uid(), function_id, 1, true), Bytes::new())
            .and_then(|packet| packet.encode())
            .unwrap();
        Packet::parse(&runtime.handle_inbound(&frame).unwrap()).unwrap().payload
    };

    let all = request(4);
    assert_eq!(all.len(), 20);
    assert_eq!(&all[..6], request(1).as_ref());
    assert_eq!(&all[6..12], request(2).as_ref());
    assert_eq!(&all[12..18], request(3).as_ref());
    assert_eq!(&all[18..], request(7).as_ref());
    // acceleration starts at (0, 0, 1000)
    assert_eq!(&all[4..6], &1000i16.to_le_bytes());
}

#[tokio::test(start_paused = true)]
async fn enable_and_disable_flip_the_flag() {
    let catalog = DeviceCatalog::builtin().unwrap();
    let runtime = DeviceRuntime::new(
        Arc::clone(catalog.get("rs232").unwrap()),
        RuntimeOptions::new("rs1"),
        Arc::new(InMemoryBus::new()),
        HandlerRegistry::new(),
    )
    .unwrap();
    let call = |function_id: u8| {
        let frame = Packet::new(Header::new(runtime.numeric_uid(), function_id, 1, true), Bytes::new())
            .and_then(|packet| packet.encode())
            .unwrap();
        Packet::parse(&runtime.handle_inbound(&frame).unwrap()).unwrap().payload
    };

    assert_eq!(call(5).as_ref(), &[0]);
    assert!(call(3).is_empty());
    assert_eq!(call(5).as_ref(), &[1]);
    assert!(call(4).is_empty());
    assert_eq!(call(5).as_ref(), &[0]);
}

#[tokio::test(start_paused = true)]
async fn identity_keeps_the_configured_uid() {
    let catalog = DeviceCatalog::builtin().unwrap();
    let runtime = DeviceRuntime::new(
        Arc::clone(catalog.get("distance_ir").unwrap()),
        RuntimeOptions::new("1abc"),
        Arc::new(InMemoryBus::new()),
        HandlerRegistry::new(),
    )
    .unwrap();
    assert_eq!(runtime.address(), "abc");

    let identity_request = |response_expected: bool| {
        Packet::new(
            Header::new(runtime.numeric_uid(), FUNCTION_GET_IDENTITY, 2, response_expected),
            Bytes::new(),
        )
        .and_then(|packet| packet.encode())
        .unwrap()
    };
    assert!(runtime.handle_inbound(&identity_request(false)).is_none());

    let answer = Packet::parse(&runtime.handle_inbound(&identity_request(true)).unwrap()).unwrap();
    let identity = tf_emu_protocol::Identity::decode(&answer.payload).unwrap();
    assert_eq!(identity.uid, "1abc");
}
