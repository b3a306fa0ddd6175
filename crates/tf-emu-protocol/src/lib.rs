//! ---
//! emu_section: "02-protocol"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "TFP wire protocol primitives and codecs."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Wire protocol primitives shared by every emulated device.
//!
//! The crate covers the fixed 8-byte packet header, the element type table
//! used to marshal typed fields into little-endian payload bytes, base58 UID
//! handling and the identity/enumerate payloads every device answers with.
#![warn(missing_docs)]

pub mod error;
pub mod identity;
pub mod packet;
pub mod types;
pub mod uid;
pub mod value;

pub use error::{ProtocolError, Result};
pub use identity::{EnumerationType, Identity};
pub use packet::{
    decode_header, decode_payload, encode_header, encode_payload, Header, Packet, Payload,
    HEADER_LEN,
};
pub use types::{ElementType, FieldDescriptor, FieldRole, RampBounds};
pub use value::Value;

/// Function id of the `get_identity` request every device implements.
pub const FUNCTION_GET_IDENTITY: u8 = 255;
/// Function id of the broadcast enumerate request.
pub const FUNCTION_ENUMERATE: u8 = 254;
/// Callback id of the enumerate answer.
pub const CALLBACK_ENUMERATE: u8 = 253;
/// UID used by clients when broadcasting to every device.
pub const BROADCAST_UID: u32 = 0;
