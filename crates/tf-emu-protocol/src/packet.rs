//! ---
//! emu_section: "02-protocol"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "TFP wire protocol primitives and codecs."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;

use crate::{FieldDescriptor, ProtocolError, Result, Value};

/// Size of the fixed packet header.
pub const HEADER_LEN: usize = 8;

const SEQUENCE_SHIFT: u8 = 4;
const RESPONSE_EXPECTED_BIT: u8 = 0b0000_1000;
const ERROR_CODE_SHIFT: u8 = 6;

/// Decoded payload, keyed by field name in declaration order.
pub type Payload = IndexMap<String, Value>;

/// Fixed 8-byte packet header.
///
/// Layout: `uid` (u32 LE), `length` (u8, header included), `function_id`,
/// `options` (sequence number in bits 4-7, response expected in bit 3) and
/// `flags` (error code in bits 6-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// Numeric device identity.
    pub uid: u32,
    /// Total packet length including the header.
    pub length: u8,
    /// Function or callback id.
    pub function_id: u8,
    /// Raw options byte.
    pub options: u8,
    /// Raw flags byte.
    pub flags: u8,
}

impl Header {
    /// Build a request header; `length` is set to the bare header size.
    pub fn new(uid: u32, function_id: u8, sequence_number: u8, response_expected: bool) -> Self {
        let mut options = (sequence_number & 0x0F) << SEQUENCE_SHIFT;
        if response_expected {
            options |= RESPONSE_EXPECTED_BIT;
        }
        Self {
            uid,
            length: HEADER_LEN as u8,
            function_id,
            options,
            flags: 0,
        }
    }

    /// Sequence number carried in the upper nibble of the options byte.
    pub fn sequence_number(&self) -> u8 {
        self.options >> SEQUENCE_SHIFT
    }

    /// Whether the caller asked for a response.
    pub fn response_expected(&self) -> bool {
        self.options & RESPONSE_EXPECTED_BIT != 0
    }

    /// Error code carried in the two top bits of the flags byte.
    pub fn error_code(&self) -> u8 {
        self.flags >> ERROR_CODE_SHIFT
    }

    /// Declared payload size.
    pub fn payload_len(&self) -> usize {
        usize::from(self.length).saturating_sub(HEADER_LEN)
    }

    /// Header answering this request: same uid and options, clean flags.
    pub fn response(&self, function_id: u8) -> Self {
        Self {
            uid: self.uid,
            length: HEADER_LEN as u8,
            function_id,
            options: self.options,
            flags: 0,
        }
    }

    /// Header of an unsolicited callback; sequence number 0, no response flag.
    pub fn callback(uid: u32, callback_id: u8) -> Self {
        Self::new(uid, callback_id, 0, false)
    }

    /// Copy of the header with `length` set for a payload of `payload_len` bytes.
    pub fn with_payload_len(mut self, payload_len: usize) -> Result<Self> {
        let total = HEADER_LEN + payload_len;
        self.length = u8::try_from(total).map_err(|_| ProtocolError::InvalidLength {
            declared: usize::from(u8::MAX),
            expected: total,
        })?;
        Ok(self)
    }
}

/// Parse the first 8 bytes of `bytes` into a [`Header`].
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::MalformedPacket { len: bytes.len() });
    }
    let mut buf = &bytes[..HEADER_LEN];
    Ok(Header {
        uid: buf.get_u32_le(),
        length: buf.get_u8(),
        function_id: buf.get_u8(),
        options: buf.get_u8(),
        flags: buf.get_u8(),
    })
}

/// Serialize a header that precedes `payload_len` payload bytes.
///
/// A `length` that disagrees with `8 + payload_len` is a descriptor/width
/// defect: debug builds panic, release builds return
/// [`ProtocolError::InvalidLength`].
pub fn encode_header(header: &Header, payload_len: usize) -> Result<[u8; HEADER_LEN]> {
    let expected = HEADER_LEN + payload_len;
    let declared = usize::from(header.length);
    debug_assert_eq!(
        declared, expected,
        "header length must cover the 8 byte header plus the payload"
    );
    if declared != expected {
        return Err(ProtocolError::InvalidLength { declared, expected });
    }
    let mut out = [0u8; HEADER_LEN];
    let mut cursor = &mut out[..];
    cursor.put_u32_le(header.uid);
    cursor.put_u8(header.length);
    cursor.put_u8(header.function_id);
    cursor.put_u8(header.options);
    cursor.put_u8(header.flags);
    Ok(out)
}

/// Decode `fields` in order from the front of `bytes`.
///
/// Each field consumes exactly `width * cardinality` bytes; trailing bytes
/// beyond the last field are ignored.
pub fn decode_payload(bytes: &[u8], fields: &[FieldDescriptor]) -> Result<Payload> {
    let mut payload = Payload::with_capacity(fields.len());
    let mut offset = 0;
    for field in fields {
        let rest = bytes.get(offset..).unwrap_or_default();
        let value = field.decode(rest)?;
        offset += field.width();
        payload.insert(field.name.clone(), value);
    }
    Ok(payload)
}

/// Encode `values` positionally against `fields`, concatenated in order.
pub fn encode_payload(fields: &[FieldDescriptor], values: &[Value]) -> Result<Bytes> {
    if fields.len() != values.len() {
        return Err(ProtocolError::CardinalityMismatch {
            expected: fields.len(),
            found: values.len(),
        });
    }
    let capacity = fields.iter().map(FieldDescriptor::width).sum();
    let mut out = BytesMut::with_capacity(capacity);
    for (field, value) in fields.iter().zip(values) {
        field.encode(value, &mut out)?;
    }
    Ok(out.freeze())
}

/// A framed packet: header plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header; `length` always matches the payload.
    pub header: Header,
    /// Payload bytes following the header.
    pub payload: Bytes,
}

impl Packet {
    /// Wrap a payload, fixing up the header length.
    pub fn new(header: Header, payload: Bytes) -> Result<Self> {
        let header = header.with_payload_len(payload.len())?;
        Ok(Self { header, payload })
    }

    /// Split an inbound buffer into header and payload.
    ///
    /// Everything after the header is kept as payload; the declared length is
    /// not enforced on inbound packets.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = decode_header(bytes)?;
        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..]),
        })
    }

    /// Serialize header and payload into a single buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let header = encode_header(&self.header, self.payload.len())?;
        let mut out = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        out.put_slice(&header);
        out.put_slice(&self.payload);
        Ok(out.freeze())
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uid={} fid={} len={} seq={} r={} payload={}",
            self.header.uid,
            self.header.function_id,
            self.header.length,
            self.header.sequence_number(),
            self.header.response_expected(),
            hex::encode(&self.payload)
        )
    }
}
