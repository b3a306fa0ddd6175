//! Hall Effect Bricklet, device identifier 240.
use tf_emu_protocol::ElementType;

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

pub(super) fn device() -> DeviceType {
    let mut device = device_type("hall_effect", "Hall Effect Bricklet", 240, [2, 0, 0]);
    device.slots.extend([
        SlotDescriptor::scalar("value", ElementType::Bool),
        SlotDescriptor::scalar("edge_count", ElementType::UInt32),
    ]);
    device.functions.extend([
        FunctionDescriptor::getter(1, "get_value", "value", vec![field("value", ElementType::Bool)]),
        // The reset flag is accepted but the counter keeps its value.
        FunctionDescriptor::getter(2, "get_edge_count", "edge_count", vec![field("count", ElementType::UInt32)])
            .with_inputs(vec![field("reset_counter", ElementType::Bool)]),
    ]);
    let mut device = device
        .stored(
            "edge_count_config",
            (3, "set_edge_count_config"),
            (4, "get_edge_count_config"),
            vec![field("edge_type", ElementType::UInt8), field("debounce", ElementType::UInt8)],
        )
        .stored(
            "edge_interrupt",
            (5, "set_edge_interrupt"),
            (6, "get_edge_interrupt"),
            vec![field("edges", ElementType::UInt32)],
        )
        .cadence("edge_count_callback_period", (7, 8));
    let report = || vec![field("count", ElementType::UInt32), field("value", ElementType::Bool)];
    device.callbacks.extend([
        CallbackDescriptor::event(9, "edge_interrupt", &["edge_count", "value"], report()),
        CallbackDescriptor {
            cadence: Some("edge_count_callback_period".to_owned()),
            ..CallbackDescriptor::event(10, "edge_count", &["edge_count", "value"], report())
        },
    ]);
    device
}
