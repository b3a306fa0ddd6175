//! IMU Brick, device identifier 16.
//!
//! Acceleration and the IMU temperature drift; the other sensor vectors hold
//! their random start values until a client overwrites them.
use tf_emu_protocol::{ElementType, FieldDescriptor, RampBounds, Value};

use super::{device_type, field};
use crate::model::{CallbackDescriptor, DeviceType, FunctionDescriptor, SlotDescriptor};

fn axes(names: &[&str], element: ElementType) -> Vec<FieldDescriptor> {
    names.iter().map(|name| field(name, element)).collect()
}

fn xyz() -> Vec<FieldDescriptor> {
    axes(&["x", "y", "z"], ElementType::Int16)
}

/// Four sensor vectors back to back: acceleration, magnetic field, angular
/// velocity and temperature.
fn all_data() -> Vec<FieldDescriptor> {
    let mut fields = axes(&["acc_x", "acc_y", "acc_z"], ElementType::Int16);
    fields.extend(axes(&["mag_x", "mag_y", "mag_z"], ElementType::Int16));
    fields.extend(axes(&["ang_x", "ang_y", "ang_z"], ElementType::Int16));
    fields.push(field("temperature", ElementType::Int16));
    fields
}

pub(super) fn device() -> DeviceType {
    let acceleration = xyz()
        .into_iter()
        .map(|field| field.with_bounds(RampBounds::new(-1000.0, 1000.0, 10.0)))
        .collect();
    let mut device = device_type("imu", "IMU Brick", 16, [2, 3, 0]);
    device.slots.extend([
        SlotDescriptor::new("acceleration", acceleration)
            .with_default(vec![Value::Int(0), Value::Int(0), Value::Int(1000)]),
        SlotDescriptor::new("magnetic_field", xyz()),
        SlotDescriptor::new("angular_velocity", xyz()),
        // °C/100
        SlotDescriptor::ramp(
            "temperature",
            ElementType::Int16,
            Value::Int(2500),
            RampBounds::new(2000.0, 3000.0, 5.0),
        ),
        SlotDescriptor::new("orientation", axes(&["roll", "pitch", "yaw"], ElementType::Int16)),
        SlotDescriptor::new("quaternion", axes(&["x", "y", "z", "w"], ElementType::Float)),
        SlotDescriptor::scalar("leds", ElementType::Bool).with_default(vec![Value::Bool(true)]),
        SlotDescriptor::new("calibration", vec![FieldDescriptor::new("data", ElementType::Int16, 10)]),
        SlotDescriptor::scalar("orientation_calculation", ElementType::Bool)
            .with_default(vec![Value::Bool(true)]),
        SlotDescriptor::scalar("status_led", ElementType::Bool).with_default(vec![Value::Bool(true)]),
        SlotDescriptor::scalar("chip_temperature", ElementType::Int16),
    ]);
    device.functions.extend([
        FunctionDescriptor::getter(1, "get_acceleration", "acceleration", xyz()),
        FunctionDescriptor::getter(2, "get_magnetic_field", "magnetic_field", xyz()),
        FunctionDescriptor::getter(3, "get_angular_velocity", "angular_velocity", xyz()),
        FunctionDescriptor::composite_getter(
            4,
            "get_all_data",
            &["acceleration", "magnetic_field", "angular_velocity", "temperature"],
            all_data(),
        ),
        FunctionDescriptor::getter(
            5,
            "get_orientation",
            "orientation",
            axes(&["roll", "pitch", "yaw"], ElementType::Int16),
        ),
        FunctionDescriptor::getter(
            6,
            "get_quaternion",
            "quaternion",
            axes(&["x", "y", "z", "w"], ElementType::Float),
        ),
        FunctionDescriptor::getter(
            7,
            "get_imu_temperature",
            "temperature",
            vec![field("temperature", ElementType::Int16)],
        ),
        FunctionDescriptor::enable(8, "leds_on", "leds"),
        FunctionDescriptor::disable(9, "leds_off", "leds"),
        FunctionDescriptor::getter(10, "are_leds_on", "leds", vec![field("leds", ElementType::Bool)]),
        FunctionDescriptor::not_implemented(17, "set_calibration"),
        FunctionDescriptor::getter(
            18,
            "get_calibration",
            "calibration",
            vec![FieldDescriptor::new("data", ElementType::Int16, 10)],
        )
        .with_inputs(vec![field("typ", ElementType::UInt8)]),
        FunctionDescriptor::enable(37, "orientation_calculation_on", "orientation_calculation"),
        FunctionDescriptor::disable(38, "orientation_calculation_off", "orientation_calculation"),
        FunctionDescriptor::getter(
            39,
            "is_orientation_calculation_on",
            "orientation_calculation",
            vec![field("orientation_calculation_on", ElementType::Bool)],
        ),
        FunctionDescriptor::enable(238, "enable_status_led", "status_led"),
        FunctionDescriptor::disable(239, "disable_status_led", "status_led"),
        FunctionDescriptor::getter(
            240,
            "is_status_led_enabled",
            "status_led",
            vec![field("enabled", ElementType::Bool)],
        ),
        FunctionDescriptor::not_implemented(241, "get_protocol1_bricklet_name"),
        FunctionDescriptor::getter(
            242,
            "get_chip_temperature",
            "chip_temperature",
            vec![field("temperature", ElementType::Int16)],
        ),
        FunctionDescriptor::not_implemented(243, "reset"),
    ]);
    let mut device = device
        .stored(
            "acceleration_range",
            (11, "set_acceleration_range"),
            (12, "get_acceleration_range"),
            vec![field("range", ElementType::UInt8)],
        )
        .stored(
            "magnetometer_range",
            (13, "set_magnetometer_range"),
            (14, "get_magnetometer_range"),
            vec![field("range", ElementType::UInt8)],
        )
        .stored(
            "convergence_speed",
            (15, "set_convergence_speed"),
            (16, "get_convergence_speed"),
            vec![field("speed", ElementType::UInt16)],
        )
        .cadence("acceleration_period", (19, 20))
        .cadence("magnetic_field_period", (21, 22))
        .cadence("angular_velocity_period", (23, 24))
        .cadence("all_data_period", (25, 26))
        .cadence("orientation_period", (27, 28))
        .cadence("quaternion_period", (29, 30));
    device.callbacks.extend([
        CallbackDescriptor::periodic(31, "acceleration", "acceleration", "acceleration_period", xyz()),
        CallbackDescriptor::periodic(32, "magnetic_field", "magnetic_field", "magnetic_field_period", xyz()),
        CallbackDescriptor::periodic(
            33,
            "angular_velocity",
            "angular_velocity",
            "angular_velocity_period",
            xyz(),
        ),
        CallbackDescriptor {
            cadence: Some("all_data_period".to_owned()),
            ..CallbackDescriptor::event(
                34,
                "all_data",
                &["acceleration", "magnetic_field", "angular_velocity", "temperature"],
                all_data(),
            )
        },
        CallbackDescriptor::periodic(
            35,
            "orientation",
            "orientation",
            "orientation_period",
            axes(&["roll", "pitch", "yaw"], ElementType::Int16),
        ),
        CallbackDescriptor::periodic(
            36,
            "quaternion",
            "quaternion",
            "quaternion_period",
            axes(&["x", "y", "z", "w"], ElementType::Float),
        ),
    ]);
    device
}
