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

use serde::{Deserialize, Serialize};

/// Runtime value of a single field.
///
/// Signed integer elements decode into [`Value::Int`], unsigned ones into
/// [`Value::UInt`]. Fixed-length char arrays and strings decode into
/// [`Value::Text`], every other element with a cardinality above one into
/// [`Value::Array`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean element.
    Bool(bool),
    /// Signed integer element (int8 through int64).
    Int(i64),
    /// Unsigned integer element (uint8 through uint64).
    UInt(u64),
    /// 32-bit float element.
    Float(f32),
    /// Fixed-length string or char array.
    Text(String),
    /// Single char element.
    Char(char),
    /// Fixed-length array of scalar elements.
    Array(Vec<Value>),
}

impl Value {
    /// Numeric view used by the ramp generator; `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Short variant name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "signed integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Char(_) => "char",
            Value::Array(_) => "array",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Char(v) => write!(f, "{v:?}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Defaults {
        values: Vec<Value>,
    }

    #[test]
    fn untagged_values_deserialize_from_toml() {
        let parsed: Defaults =
            toml::from_str(r#"values = [true, 100, 1.5, "abc", [1, 2, 3]]"#).expect("parse");
        assert_eq!(
            parsed.values,
            vec![
                Value::Bool(true),
                Value::Int(100),
                Value::Float(1.5),
                Value::Text("abc".into()),
                Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ]
        );
    }

    #[test]
    fn numeric_view_covers_integer_and_float_variants() {
        assert_eq!(Value::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::UInt(7).as_f64(), Some(7.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn display_renders_arrays() {
        let value = Value::Array(vec![Value::UInt(1), Value::UInt(2)]);
        assert_eq!(value.to_string(), "[1, 2]");
    }
}
