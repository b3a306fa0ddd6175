//! Dual Button Bricklet, device identifier 230.
use tf_emu_protocol::{ElementType, FieldDescriptor};

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

fn pair(left: &str, right: &str) -> Vec<FieldDescriptor> {
    vec![field(left, ElementType::UInt8), field(right, ElementType::UInt8)]
}

pub(super) fn device() -> DeviceType {
    let mut device = device_type("dual_button", "Dual Button Bricklet", 230, [2, 0, 0])
        .stored("led_state", (1, "set_led_state"), (2, "get_led_state"), pair("led_l", "led_r"));
    device.slots.push(SlotDescriptor::new("button_state", pair("button_l", "button_r")));
    device.functions.extend([
        FunctionDescriptor::getter(3, "get_button_state", "button_state", pair("button_l", "button_r")),
        FunctionDescriptor::not_implemented(5, "set_selected_led_state"),
    ]);
    let mut outputs = pair("button_l", "button_r");
    outputs.extend(pair("led_l", "led_r"));
    device.callbacks.push(CallbackDescriptor::event(
        4,
        "state_changed",
        &["button_state", "led_state"],
        outputs,
    ));
    device
}
