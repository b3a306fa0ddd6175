//! Distance IR Bricklet, device identifier 25.
use tf_emu_protocol::{ElementType, RampBounds, Value};

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

pub(super) fn device() -> DeviceType {
    let mut device = device_type("distance_ir", "Distance IR Bricklet", 25, [2, 0, 0]);
    let bounds = RampBounds::new(0.0, 1000.0, 1.0);
    for name in ["distance", "analog_value"] {
        device.slots.push(SlotDescriptor::ramp(name, ElementType::UInt16, Value::UInt(100), bounds));
    }
    device.functions.extend([
        FunctionDescriptor::getter(1, "get_distance", "distance", vec![field("distance", ElementType::UInt16)]),
        FunctionDescriptor::getter(2, "get_analog_value", "analog_value", vec![field("value", ElementType::UInt16)]),
        FunctionDescriptor::not_implemented(3, "set_sampling_point"),
        FunctionDescriptor::getter(4, "get_sampling_point", "sampling_point", vec![field("distance", ElementType::UInt16)])
            .with_inputs(vec![field("position", ElementType::UInt8)]),
    ]);
    device.slots.push(SlotDescriptor::scalar("sampling_point", ElementType::UInt16));
    let mut device = device
        .cadence("distance_callback_period", (5, 6))
        .cadence("analog_value_callback_period", (7, 8))
        .threshold("distance_callback_threshold", (9, 10), ElementType::UInt16)
        .threshold("analog_value_callback_threshold", (11, 12), ElementType::UInt16)
        .stored(
            "debounce_period",
            (13, "set_debounce_period"),
            (14, "get_debounce_period"),
            vec![field("debounce", ElementType::UInt32)],
        );
    device.callbacks.extend([
        CallbackDescriptor::periodic(
            15,
            "distance",
            "distance",
            "distance_callback_period",
            vec![field("distance", ElementType::UInt16)],
        ),
        CallbackDescriptor::periodic(
            16,
            "analog_value",
            "analog_value",
            "analog_value_callback_period",
            vec![field("value", ElementType::UInt16)],
        ),
    ]);
    device
}
