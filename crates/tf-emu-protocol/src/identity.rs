//! ---
//! emu_section: "02-protocol"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "TFP wire protocol primitives and codecs."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use bytes::Bytes;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{decode_payload, encode_payload, ElementType, FieldDescriptor, Result, Value};

static IDENTITY_FIELDS: Lazy<Vec<FieldDescriptor>> = Lazy::new(|| {
    vec![
        FieldDescriptor::new("uid", ElementType::Char, 8),
        FieldDescriptor::new("connected_uid", ElementType::Char, 8),
        FieldDescriptor::scalar("position", ElementType::Char),
        FieldDescriptor::new("hardware_version", ElementType::UInt8, 3),
        FieldDescriptor::new("firmware_version", ElementType::UInt8, 3),
        FieldDescriptor::scalar("device_identifier", ElementType::UInt16),
    ]
});

static ENUMERATE_FIELDS: Lazy<Vec<FieldDescriptor>> = Lazy::new(|| {
    let mut fields = Vec::clone(&IDENTITY_FIELDS);
    fields.push(FieldDescriptor::scalar("enumeration_type", ElementType::UInt8));
    fields
});

/// Reason attached to an enumerate callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EnumerationType {
    /// Answer to an explicit enumerate request.
    Available = 0,
    /// Device was newly connected.
    Connected = 1,
    /// Device went away.
    Disconnected = 2,
}

/// Identity every device reports through `get_identity` and enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Printable base58 UID.
    pub uid: String,
    /// UID of the brick the device hangs off, `"0"` for top level devices.
    pub connected_uid: String,
    /// Port position on the parent brick.
    pub position: char,
    /// Hardware revision.
    pub hardware_version: [u8; 3],
    /// Firmware revision.
    pub firmware_version: [u8; 3],
    /// Numeric device type.
    pub device_identifier: u16,
}

impl Identity {
    /// Identity of a top level device.
    pub fn new(uid: impl Into<String>, device_identifier: u16) -> Self {
        Self {
            uid: uid.into(),
            connected_uid: "0".to_owned(),
            position: '0',
            hardware_version: [1, 0, 0],
            firmware_version: [2, 0, 0],
            device_identifier,
        }
    }

    /// Field layout of the 25 byte identity payload.
    pub fn fields() -> &'static [FieldDescriptor] {
        &IDENTITY_FIELDS
    }

    /// Field layout of the 26 byte enumerate callback payload.
    pub fn enumerate_fields() -> &'static [FieldDescriptor] {
        &ENUMERATE_FIELDS
    }

    /// Encode the `get_identity` response payload.
    pub fn encode(&self) -> Result<Bytes> {
        encode_payload(Self::fields(), &self.values())
    }

    /// Encode the enumerate callback payload.
    pub fn encode_enumerate(&self, kind: EnumerationType) -> Result<Bytes> {
        let mut values = self.values();
        values.push(Value::UInt(kind as u64));
        encode_payload(Self::enumerate_fields(), &values)
    }

    /// Decode an identity payload (the enumerate suffix, if any, is ignored).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let payload = decode_payload(bytes, Self::fields())?;
        let text = |name: &str| match payload.get(name) {
            Some(Value::Text(text)) => text.clone(),
            _ => String::new(),
        };
        let version = |name: &str| {
            let mut out = [0u8; 3];
            if let Some(Value::Array(items)) = payload.get(name) {
                for (slot, item) in out.iter_mut().zip(items) {
                    if let Value::UInt(v) = item {
                        *slot = *v as u8;
                    }
                }
            }
            out
        };
        Ok(Self {
            uid: text("uid"),
            connected_uid: text("connected_uid"),
            position: match payload.get("position") {
                Some(Value::Char(ch)) => *ch,
                _ => '\0',
            },
            hardware_version: version("hardware_version"),
            firmware_version: version("firmware_version"),
            device_identifier: match payload.get("device_identifier") {
                Some(Value::UInt(v)) => *v as u16,
                _ => 0,
            },
        })
    }

    fn values(&self) -> Vec<Value> {
        let version = |v: [u8; 3]| Value::Array(v.iter().map(|b| Value::UInt(u64::from(*b))).collect());
        vec![
            Value::Text(self.uid.clone()),
            Value::Text(self.connected_uid.clone()),
            Value::Char(self.position),
            version(self.hardware_version),
            version(self.firmware_version),
            Value::UInt(u64::from(self.device_identifier)),
        ]
    }
}
