//! RS232 Bricklet, device identifier 254.
use tf_emu_protocol::{ElementType, FieldDescriptor, Value};

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

fn message() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("message", ElementType::Char, 60),
        field("length", ElementType::UInt8),
    ]
}

pub(super) fn device() -> DeviceType {
    let mut device = device_type("rs232", "RS232 Bricklet", 254, [2, 0, 2]);
    device.slots.extend([
        SlotDescriptor::new("read_buffer", message()),
        SlotDescriptor::scalar("read_callback", ElementType::Bool).with_default(vec![Value::Bool(false)]),
        SlotDescriptor::scalar("error", ElementType::UInt8),
    ]);
    device.functions.extend([
        FunctionDescriptor::not_implemented(1, "write"),
        FunctionDescriptor::getter(2, "read", "read_buffer", message()),
        FunctionDescriptor::enable(3, "enable_read_callback", "read_callback"),
        FunctionDescriptor::disable(4, "disable_read_callback", "read_callback"),
        FunctionDescriptor::getter(
            5,
            "is_read_callback_enabled",
            "read_callback",
            vec![field("enabled", ElementType::Bool)],
        ),
    ]);
    let mut device = device.stored(
        "configuration",
        (6, "set_configuration"),
        (7, "get_configuration"),
        [
            "baudrate",
            "parity",
            "stopbits",
            "wordlength",
            "hardware_flowcontrol",
            "software_flowcontrol",
        ]
        .into_iter()
        .map(|name| field(name, ElementType::UInt8))
        .collect(),
    );
    device.callbacks.extend([
        CallbackDescriptor::event(8, "read_callback", &["read_buffer"], message()),
        CallbackDescriptor::event(9, "error_callback", &["error"], vec![field("error", ElementType::UInt8)]),
    ]);
    device
}
