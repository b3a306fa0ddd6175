//! ---
//! emu_section: "02-protocol"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "TFP wire protocol primitives and codecs."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{ProtocolError, Result, Value};

/// Element types understood by the protocol, with their fixed byte widths.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ElementType {
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Boolean stored as one byte.
    Bool,
    /// Single byte character.
    Char,
    /// Fixed-length, zero padded string; one byte per element.
    String,
    /// IEEE-754 single precision float.
    Float,
}

impl ElementType {
    /// Width of a single element in bytes.
    pub const fn width(self) -> usize {
        match self {
            ElementType::Int8
            | ElementType::UInt8
            | ElementType::Bool
            | ElementType::Char
            | ElementType::String => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float => 4,
            ElementType::Int64 | ElementType::UInt64 => 8,
        }
    }

    /// Parse a type name as used in device descriptions (`uint16`, `char`, ...).
    pub fn parse(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| ProtocolError::UnknownElementType(name.to_owned()))
    }

    /// Inclusive integer range of the element, `None` for non-integer types.
    pub const fn integer_bounds(self) -> Option<(i128, i128)> {
        match self {
            ElementType::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            ElementType::UInt8 => Some((0, u8::MAX as i128)),
            ElementType::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            ElementType::UInt16 => Some((0, u16::MAX as i128)),
            ElementType::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            ElementType::UInt32 => Some((0, u32::MAX as i128)),
            ElementType::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            ElementType::UInt64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Whether `cardinality` elements of this type form a text value.
    pub const fn is_textual(self, cardinality: usize) -> bool {
        matches!(self, ElementType::String) || (matches!(self, ElementType::Char) && cardinality > 1)
    }

    const fn is_signed(self) -> bool {
        matches!(
            self,
            ElementType::Int8 | ElementType::Int16 | ElementType::Int32 | ElementType::Int64
        )
    }

    /// Encode `cardinality` elements of this type, little-endian.
    ///
    /// Text is truncated or zero padded to exactly `cardinality` bytes.
    pub fn encode(self, value: &Value, cardinality: usize, out: &mut BytesMut) -> Result<()> {
        if self.is_textual(cardinality) {
            return encode_text(self, value, cardinality, out);
        }
        if cardinality == 1 {
            return self.encode_scalar(value, out);
        }
        match value {
            Value::Array(items) if items.len() == cardinality => {
                for item in items {
                    self.encode_scalar(item, out)?;
                }
                Ok(())
            }
            Value::Array(items) => Err(ProtocolError::CardinalityMismatch {
                expected: cardinality,
                found: items.len(),
            }),
            other => Err(self.mismatch(other)),
        }
    }

    /// Decode `cardinality` elements from the front of `bytes`.
    ///
    /// Fails with [`ProtocolError::TruncatedPayload`] when fewer than
    /// `width * cardinality` bytes are available; extra bytes are ignored.
    pub fn decode(self, bytes: &[u8], cardinality: usize) -> Result<Value> {
        let needed = self.width() * cardinality;
        if bytes.len() < needed {
            return Err(ProtocolError::TruncatedPayload {
                field: self.to_string(),
                needed,
                available: bytes.len(),
            });
        }
        let mut buf = &bytes[..needed];
        if self.is_textual(cardinality) {
            return Ok(Value::Text(decode_text(buf)));
        }
        if cardinality == 1 {
            return Ok(self.decode_scalar(&mut buf));
        }
        Ok(Value::Array(
            (0..cardinality).map(|_| self.decode_scalar(&mut buf)).collect(),
        ))
    }

    /// Zero value of the element (`0`, `false`, empty text or zeroed array).
    pub fn zero(self, cardinality: usize) -> Value {
        if self.is_textual(cardinality) {
            return Value::Text(String::new());
        }
        let scalar = match self {
            ElementType::Bool => Value::Bool(false),
            ElementType::Float => Value::Float(0.0),
            ElementType::Char => Value::Char('\0'),
            _ if self.is_signed() => Value::Int(0),
            _ => Value::UInt(0),
        };
        if cardinality == 1 {
            scalar
        } else {
            Value::Array(vec![scalar; cardinality])
        }
    }

    /// Convert a numeric reading back into a canonical value of this type.
    ///
    /// Integers are rounded to the nearest whole number and range checked.
    pub fn value_from_f64(self, raw: f64) -> Result<Value> {
        match self {
            ElementType::Float => Ok(Value::Float(raw as f32)),
            ElementType::Bool => Ok(Value::Bool(raw != 0.0)),
            _ => {
                let Some((min, max)) = self.integer_bounds() else {
                    return Err(ProtocolError::TypeMismatch {
                        expected: self.to_string(),
                        found: "number".to_owned(),
                    });
                };
                let rounded = raw.round();
                if !rounded.is_finite() || rounded < min as f64 || rounded > max as f64 {
                    return Err(ProtocolError::ValueOutOfRange {
                        element: self.to_string(),
                        value: raw.to_string(),
                    });
                }
                if self.is_signed() {
                    Ok(Value::Int(rounded as i64))
                } else {
                    Ok(Value::UInt(rounded as u64))
                }
            }
        }
    }

    fn encode_scalar(self, value: &Value, out: &mut BytesMut) -> Result<()> {
        match self {
            ElementType::Int8 => out.put_i8(self.integer(value)? as i8),
            ElementType::UInt8 => out.put_u8(self.integer(value)? as u8),
            ElementType::Int16 => out.put_i16_le(self.integer(value)? as i16),
            ElementType::UInt16 => out.put_u16_le(self.integer(value)? as u16),
            ElementType::Int32 => out.put_i32_le(self.integer(value)? as i32),
            ElementType::UInt32 => out.put_u32_le(self.integer(value)? as u32),
            ElementType::Int64 => out.put_i64_le(self.integer(value)? as i64),
            ElementType::UInt64 => out.put_u64_le(self.integer(value)? as u64),
            ElementType::Bool => match value {
                Value::Bool(flag) => out.put_u8(u8::from(*flag)),
                other => return Err(self.mismatch(other)),
            },
            ElementType::Float => match value {
                Value::Float(v) => out.put_f32_le(*v),
                Value::Int(v) => out.put_f32_le(*v as f32),
                Value::UInt(v) => out.put_f32_le(*v as f32),
                other => return Err(self.mismatch(other)),
            },
            ElementType::Char | ElementType::String => {
                let ch = match value {
                    Value::Char(ch) => *ch,
                    Value::Text(text) if text.chars().count() <= 1 => {
                        text.chars().next().unwrap_or('\0')
                    }
                    other => return Err(self.mismatch(other)),
                };
                out.put_u8(char_byte(self, ch)?);
            }
        }
        Ok(())
    }

    fn decode_scalar(self, buf: &mut &[u8]) -> Value {
        match self {
            ElementType::Int8 => Value::Int(i64::from(buf.get_i8())),
            ElementType::UInt8 => Value::UInt(u64::from(buf.get_u8())),
            ElementType::Int16 => Value::Int(i64::from(buf.get_i16_le())),
            ElementType::UInt16 => Value::UInt(u64::from(buf.get_u16_le())),
            ElementType::Int32 => Value::Int(i64::from(buf.get_i32_le())),
            ElementType::UInt32 => Value::UInt(u64::from(buf.get_u32_le())),
            ElementType::Int64 => Value::Int(buf.get_i64_le()),
            ElementType::UInt64 => Value::UInt(buf.get_u64_le()),
            ElementType::Bool => Value::Bool(buf.get_u8() != 0),
            ElementType::Float => Value::Float(buf.get_f32_le()),
            ElementType::Char | ElementType::String => Value::Char(char::from(buf.get_u8())),
        }
    }

    fn integer(self, value: &Value) -> Result<i128> {
        let raw = match value {
            Value::Int(v) => i128::from(*v),
            Value::UInt(v) => i128::from(*v),
            other => return Err(self.mismatch(other)),
        };
        let Some((min, max)) = self.integer_bounds() else {
            return Err(self.mismatch(value));
        };
        if raw < min || raw > max {
            return Err(ProtocolError::ValueOutOfRange {
                element: self.to_string(),
                value: raw.to_string(),
            });
        }
        Ok(raw)
    }

    fn mismatch(self, found: &Value) -> ProtocolError {
        ProtocolError::TypeMismatch {
            expected: self.to_string(),
            found: found.kind().to_owned(),
        }
    }
}

fn char_byte(element: ElementType, ch: char) -> Result<u8> {
    u8::try_from(u32::from(ch)).map_err(|_| ProtocolError::ValueOutOfRange {
        element: element.to_string(),
        value: ch.to_string(),
    })
}

fn encode_text(
    element: ElementType,
    value: &Value,
    cardinality: usize,
    out: &mut BytesMut,
) -> Result<()> {
    let text = match value {
        Value::Text(text) => text.as_str(),
        other => return Err(element.mismatch(other)),
    };
    let mut written = 0;
    for ch in text.chars().take(cardinality) {
        out.put_u8(char_byte(element, ch)?);
        written += 1;
    }
    out.put_bytes(0, cardinality - written);
    Ok(())
}

fn decode_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|byte| **byte != 0)
        .map(|byte| char::from(*byte))
        .collect()
}

/// Role of a field within a function, callback or device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Request parameter of a function.
    In,
    /// Response value of a function or callback.
    #[default]
    Out,
    /// Backing store of a sensor or actuator value.
    Store,
}

/// Bounds of a ramp generator driving a sensor field.
///
/// The generator clamps every value into `[min, max]`. When `step` does not
/// divide `max - min` the last step before a turn is therefore shorter than
/// `step`; the built-in device types all use steps that divide their range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampBounds {
    /// Lower turning point.
    pub min: f64,
    /// Upper turning point.
    pub max: f64,
    /// Increment applied per generator tick; `0` disables the generator.
    pub step: f64,
}

impl RampBounds {
    /// Construct bounds for a ramp between `min` and `max`.
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }
}

fn default_cardinality() -> usize {
    1
}

/// A named, typed field with a fixed element count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, unique within its function/callback/slot.
    pub name: String,
    /// Element type.
    #[serde(rename = "type")]
    pub element: ElementType,
    /// Element count; `1` for scalars.
    #[serde(default = "default_cardinality")]
    pub cardinality: usize,
    /// Where the field is used.
    #[serde(default)]
    pub role: FieldRole,
    /// Ramp bounds when the field is driven by a generator.
    #[serde(default)]
    pub bounds: Option<RampBounds>,
}

impl FieldDescriptor {
    /// Construct an output field.
    pub fn new(name: impl Into<String>, element: ElementType, cardinality: usize) -> Self {
        Self {
            name: name.into(),
            element,
            cardinality,
            role: FieldRole::Out,
            bounds: None,
        }
    }

    /// Shorthand for a scalar output field.
    pub fn scalar(name: impl Into<String>, element: ElementType) -> Self {
        Self::new(name, element, 1)
    }

    /// Replace the field role.
    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }

    /// Attach ramp bounds.
    pub fn with_bounds(mut self, bounds: RampBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Total encoded width in bytes.
    pub fn width(&self) -> usize {
        self.element.width() * self.cardinality
    }

    /// Zero value matching the field layout.
    pub fn zero(&self) -> Value {
        self.element.zero(self.cardinality)
    }

    /// Encode a value for this field.
    pub fn encode(&self, value: &Value, out: &mut BytesMut) -> Result<()> {
        self.element.encode(value, self.cardinality, out)
    }

    /// Decode this field from the front of `bytes`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        self.element
            .decode(bytes, self.cardinality)
            .map_err(|err| match err {
                ProtocolError::TruncatedPayload {
                    needed, available, ..
                } => ProtocolError::TruncatedPayload {
                    field: self.name.clone(),
                    needed,
                    available,
                },
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(element: ElementType, value: &Value, cardinality: usize) -> Vec<u8> {
        let mut out = BytesMut::new();
        element
            .encode(value, cardinality, &mut out)
            .expect("encode succeeds");
        out.to_vec()
    }

    #[test]
    fn widths_follow_the_wire_table() {
        assert_eq!(ElementType::String.width(), 1);
        assert_eq!(ElementType::Char.width(), 1);
        assert_eq!(ElementType::Bool.width(), 1);
        assert_eq!(ElementType::Int8.width(), 1);
        assert_eq!(ElementType::UInt16.width(), 2);
        assert_eq!(ElementType::Float.width(), 4);
        assert_eq!(ElementType::UInt32.width(), 4);
        assert_eq!(ElementType::Int64.width(), 8);
        assert_eq!(ElementType::UInt64.width(), 8);
    }

    #[test]
    fn type_names_parse_in_lowercase() {
        assert_eq!(ElementType::parse("uint16").unwrap(), ElementType::UInt16);
        assert_eq!(ElementType::parse("float").unwrap(), ElementType::Float);
        assert_eq!(ElementType::UInt32.to_string(), "uint32");
        assert!(matches!(
            ElementType::parse("double"),
            Err(ProtocolError::UnknownElementType(_))
        ));
    }

    #[test]
    fn integers_are_little_endian() {
        assert_eq!(encoded(ElementType::UInt16, &Value::UInt(42), 1), vec![0x2A, 0x00]);
        assert_eq!(
            encoded(ElementType::UInt32, &Value::UInt(100), 1),
            vec![0x64, 0x00, 0x00, 0x00]
        );
        assert_eq!(encoded(ElementType::Int16, &Value::Int(-2), 1), vec![0xFE, 0xFF]);
    }

    #[test]
    fn text_is_padded_and_truncated() {
        assert_eq!(
            encoded(ElementType::String, &Value::from("abc"), 5),
            b"abc\0\0".to_vec()
        );
        assert_eq!(encoded(ElementType::Char, &Value::from("abcdef"), 3), b"abc".to_vec());
        let decoded = ElementType::Char.decode(b"ab\0\0x", 5).unwrap();
        assert_eq!(decoded, Value::Text("ab".into()));
    }

    #[test]
    fn arrays_require_exact_cardinality() {
        let value = Value::Array(vec![Value::Int(1), Value::Int(-1)]);
        assert_eq!(encoded(ElementType::Int16, &value, 2), vec![1, 0, 0xFF, 0xFF]);

        let mut out = BytesMut::new();
        let err = ElementType::Int16.encode(&value, 3, &mut out).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::CardinalityMismatch {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn decoding_short_buffers_is_a_framing_error() {
        let err = ElementType::UInt32.decode(&[1, 2], 1).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TruncatedPayload {
                needed: 4,
                available: 2,
                ..
            }
        ));
        let field = FieldDescriptor::scalar("period", ElementType::UInt32);
        match field.decode(&[0]).unwrap_err() {
            ProtocolError::TruncatedPayload { field, .. } => assert_eq!(field, "period"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn out_of_range_and_mismatched_values_are_rejected() {
        let mut out = BytesMut::new();
        assert!(matches!(
            ElementType::UInt8.encode(&Value::UInt(256), 1, &mut out),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            ElementType::UInt16.encode(&Value::Int(-1), 1, &mut out),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            ElementType::Bool.encode(&Value::UInt(1), 1, &mut out),
            Err(ProtocolError::TypeMismatch { .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn decode_restores_encoded_values() {
        let cases = [
            (ElementType::Int8, Value::Int(-128), 1),
            (ElementType::UInt64, Value::UInt(u64::MAX), 1),
            (ElementType::Int64, Value::Int(i64::MIN), 1),
            (ElementType::Bool, Value::Bool(true), 1),
            (ElementType::Char, Value::Char('x'), 1),
            (ElementType::Float, Value::Float(-12.25), 1),
            (
                ElementType::UInt8,
                Value::Array(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]),
                3,
            ),
            (ElementType::String, Value::Text("hello".into()), 8),
        ];
        for (element, value, cardinality) in cases {
            let bytes = encoded(element, &value, cardinality);
            assert_eq!(bytes.len(), element.width() * cardinality);
            assert_eq!(element.decode(&bytes, cardinality).unwrap(), value);
        }
    }

    #[test]
    fn numeric_readings_convert_back_into_canonical_values() {
        assert_eq!(ElementType::UInt16.value_from_f64(99.6).unwrap(), Value::UInt(100));
        assert_eq!(ElementType::Int32.value_from_f64(-3.0).unwrap(), Value::Int(-3));
        assert!(ElementType::UInt8.value_from_f64(300.0).is_err());
        assert!(ElementType::String.value_from_f64(1.0).is_err());
    }

    #[test]
    fn field_descriptor_deserializes_with_defaults() {
        let field: FieldDescriptor = toml::from_str(
            r#"
            name = "distance"
            type = "uint16"
            role = "store"
            bounds = { min = 0.0, max = 1000.0, step = 1.0 }
            "#,
        )
        .unwrap();
        assert_eq!(field.cardinality, 1);
        assert_eq!(field.role, FieldRole::Store);
        assert_eq!(field.width(), 2);
        assert_eq!(field.bounds, Some(RampBounds::new(0.0, 1000.0, 1.0)));
    }
}
