//! LED Strip Bricklet, device identifier 231.
use tf_emu_protocol::{ElementType, FieldDescriptor, Value};

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

const CHUNK: usize = 16;

fn colours() -> Vec<FieldDescriptor> {
    ["r", "g", "b"]
        .into_iter()
        .map(|name| FieldDescriptor::new(name, ElementType::UInt8, CHUNK))
        .collect()
}

pub(super) fn device() -> DeviceType {
    let mut device = device_type("led_strip", "LED Strip Bricklet", 231, [2, 0, 3]);
    device.slots.extend([
        SlotDescriptor::new("rgb_values", colours()),
        SlotDescriptor::scalar("supply_voltage", ElementType::UInt16),
        SlotDescriptor::scalar("frame_duration", ElementType::UInt16).with_default(vec![Value::UInt(100)]),
        SlotDescriptor::scalar("rendered_length", ElementType::UInt16),
    ]);
    device.functions.extend([
        FunctionDescriptor::not_implemented(1, "set_rgb_values"),
        // Index and length are accepted; the whole chunk is returned.
        FunctionDescriptor::getter(2, "get_rgb_values", "rgb_values", colours()).with_inputs(vec![
            field("index", ElementType::UInt16),
            field("length", ElementType::UInt8),
        ]),
        FunctionDescriptor::setter(3, "set_frame_duration", "frame_duration", vec![field("duration", ElementType::UInt16)]),
        FunctionDescriptor::getter(4, "get_frame_duration", "frame_duration", vec![field("duration", ElementType::UInt16)]),
        FunctionDescriptor::getter(5, "get_supply_voltage", "supply_voltage", vec![field("voltage", ElementType::UInt16)]),
    ]);
    let mut device = device
        .stored(
            "clock_frequency",
            (7, "set_clock_frequency"),
            (8, "get_clock_frequency"),
            vec![field("frequency", ElementType::UInt32)],
        )
        .stored(
            "chip_type",
            (9, "set_chip_type"),
            (10, "get_chip_type"),
            vec![field("chip", ElementType::UInt16)],
        );
    device.callbacks.push(CallbackDescriptor::event(
        6,
        "frame_rendered",
        &["rendered_length"],
        vec![field("length", ElementType::UInt16)],
    ));
    device
}
