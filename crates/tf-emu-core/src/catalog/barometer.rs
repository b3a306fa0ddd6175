//! Barometer Bricklet, device identifier 221.
use tf_emu_protocol::{ElementType, RampBounds, Value};

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

pub(super) fn device() -> DeviceType {
    let mut device = device_type("barometer", "Barometer Bricklet", 221, [2, 0, 1]);
    device.slots.extend([
        // mbar/1000
        SlotDescriptor::ramp(
            "air_pressure",
            ElementType::Int32,
            Value::Int(1_013_250),
            RampBounds::new(1_000_000.0, 1_030_000.0, 50.0),
        ),
        // cm
        SlotDescriptor::ramp(
            "altitude",
            ElementType::Int32,
            Value::Int(0),
            RampBounds::new(-500.0, 500.0, 5.0),
        ),
        SlotDescriptor::scalar("chip_temperature", ElementType::Int16),
        SlotDescriptor::scalar("reference_air_pressure", ElementType::Int32)
            .with_default(vec![Value::Int(1_013_250)]),
    ]);
    device.functions.extend([
        FunctionDescriptor::getter(1, "get_air_pressure", "air_pressure", vec![field("air_pressure", ElementType::Int32)]),
        FunctionDescriptor::getter(2, "get_altitude", "altitude", vec![field("altitude", ElementType::Int32)]),
        FunctionDescriptor::setter(
            13,
            "set_reference_air_pressure",
            "reference_air_pressure",
            vec![field("air_pressure", ElementType::Int32)],
        ),
        FunctionDescriptor::getter(
            14,
            "get_chip_temperature",
            "chip_temperature",
            vec![field("temperature", ElementType::Int16)],
        ),
        FunctionDescriptor::getter(
            19,
            "get_reference_air_pressure",
            "reference_air_pressure",
            vec![field("air_pressure", ElementType::Int32)],
        ),
    ]);
    let mut device = device
        .cadence("air_pressure_callback_period", (3, 4))
        .cadence("altitude_callback_period", (5, 6))
        .threshold("air_pressure_callback_threshold", (7, 8), ElementType::Int32)
        .threshold("altitude_callback_threshold", (9, 10), ElementType::Int32)
        .stored(
            "debounce_period",
            (11, "set_debounce_period"),
            (12, "get_debounce_period"),
            vec![field("debounce", ElementType::UInt32)],
        )
        .stored(
            "averaging",
            (20, "set_averaging"),
            (21, "get_averaging"),
            vec![
                field("moving_average_pressure", ElementType::UInt8),
                field("average_pressure", ElementType::UInt8),
                field("average_temperature", ElementType::UInt8),
            ],
        );
    device.callbacks.extend([
        CallbackDescriptor::periodic(
            15,
            "air_pressure",
            "air_pressure",
            "air_pressure_callback_period",
            vec![field("air_pressure", ElementType::Int32)],
        ),
        CallbackDescriptor::periodic(
            16,
            "altitude",
            "altitude",
            "altitude_callback_period",
            vec![field("altitude", ElementType::Int32)],
        ),
    ]);
    device
}
