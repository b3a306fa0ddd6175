//! ---
//! emu_section: "02-protocol"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "TFP wire protocol primitives and codecs."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use thiserror::Error;

/// Shared result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Failures raised while framing, unframing or marshaling packets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than a full header were received.
    #[error("malformed packet: {len} bytes is shorter than the 8 byte header")]
    MalformedPacket {
        /// Number of bytes actually received.
        len: usize,
    },
    /// The payload ended before every declared field was consumed.
    #[error("truncated payload: field '{field}' needs {needed} bytes, {available} available")]
    TruncatedPayload {
        /// Field being decoded when the buffer ran out.
        field: String,
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// Header length does not match `8 + payload` (descriptor/width mismatch).
    #[error("invalid packet length: header declares {declared}, payload requires {expected}")]
    InvalidLength {
        /// Length requested for the header.
        declared: usize,
        /// Length implied by the payload.
        expected: usize,
    },
    /// A value variant does not fit the element type it is encoded as.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Element type of the field.
        expected: String,
        /// Description of the value supplied.
        found: String,
    },
    /// A numeric value is outside the range of its element type.
    #[error("value {value} does not fit into {element}")]
    ValueOutOfRange {
        /// Element type of the field.
        element: String,
        /// Offending value rendered as text.
        value: String,
    },
    /// An array value holds the wrong number of elements.
    #[error("cardinality mismatch: expected {expected} elements, found {found}")]
    CardinalityMismatch {
        /// Declared cardinality.
        expected: usize,
        /// Elements supplied.
        found: usize,
    },
    /// The UID string is not valid base58.
    #[error("invalid uid '{0}'")]
    InvalidUid(String),
    /// Unknown element type name in a device description.
    #[error("unknown element type '{0}'")]
    UnknownElementType(String),
}
