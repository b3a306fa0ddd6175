//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use thiserror::Error;
use tf_emu_protocol::ProtocolError;

/// Problems found while compiling a device description or resolving it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{device}: slot '{slot}' is declared more than once")]
    DuplicateSlot { device: String, slot: String },
    #[error("{device}: '{item}' refers to unknown slot '{slot}'")]
    UnknownSlot {
        device: String,
        item: String,
        slot: String,
    },
    #[error("{device}: id {id} is used more than once")]
    DuplicateId { device: String, id: u8 },
    #[error("{device}: '{item}' uses reserved id {id}")]
    ReservedId { device: String, item: String, id: u8 },
    #[error("{device}: '{item}' expects layout ({expected}) but declares ({found})")]
    LayoutMismatch {
        device: String,
        item: String,
        expected: String,
        found: String,
    },
    #[error("{device}: default of slot '{slot}' is invalid: {reason}")]
    InvalidDefault {
        device: String,
        slot: String,
        reason: String,
    },
    #[error("{device}: ramp bounds of '{slot}.{field}' are unusable")]
    InvalidBounds {
        device: String,
        slot: String,
        field: String,
    },
    #[error("{device}: '{item}' needs a single uint32 cadence slot, '{slot}' is not one")]
    NotACadence {
        device: String,
        item: String,
        slot: String,
    },
    #[error("{device}: '{item}' needs a single flag field, slot '{slot}' is not one")]
    NotAFlag {
        device: String,
        item: String,
        slot: String,
    },
    #[error("unknown device type '{0}'")]
    UnknownDeviceType(String),
    #[error("device type '{0}' is registered more than once")]
    DuplicateDeviceType(String),
}

/// Reasons a request produced no answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("unknown function {function_id}")]
    UnknownFunction { function_id: u8 },
    #[error("function {function_id} ({name}) is not implemented")]
    NotImplemented { function_id: u8, name: String },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
