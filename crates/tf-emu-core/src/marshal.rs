//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Bridges slot values and payload bytes.
use bytes::Bytes;
use tf_emu_protocol::{encode_payload, FieldDescriptor, Result, Value};
use tf_emu_sim::DefaultValues;

use crate::model::{DefaultPolicy, SlotDescriptor};

/// Initial values of `slot`: the fixed default, or one random draw per field.
pub fn initial_values(slot: &SlotDescriptor, defaults: &mut DefaultValues) -> Vec<Value> {
    match &slot.default {
        DefaultPolicy::Fixed(values) => values.clone(),
        DefaultPolicy::Random => slot
            .fields
            .iter()
            .map(|field| defaults.value_for(field))
            .collect(),
    }
}

/// Encode the current values of a slot with the given output layout.
pub fn encode_values(fields: &[FieldDescriptor], values: &[Value]) -> Result<Bytes> {
    encode_payload(fields, values)
}

/// Decode an input payload into values ready to be stored verbatim.
///
/// Positional, so layouts reusing a field name still yield every value.
pub fn decode_values(fields: &[FieldDescriptor], bytes: &[u8]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(fields.len());
    let mut offset = 0;
    for field in fields {
        values.push(field.decode(bytes.get(offset..).unwrap_or_default())?);
        offset += field.width();
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_emu_protocol::{ElementType, ProtocolError};

    fn thresholds() -> SlotDescriptor {
        SlotDescriptor::new(
            "distance_callback_threshold",
            vec![
                FieldDescriptor::scalar("option", ElementType::Char),
                FieldDescriptor::scalar("min", ElementType::UInt16),
                FieldDescriptor::scalar("max", ElementType::UInt16),
            ],
        )
        .with_default(vec![Value::Char('x'), Value::UInt(0), Value::UInt(0)])
    }

    #[test]
    fn fixed_defaults_encode_in_field_order() {
        let mut defaults = DefaultValues::seeded(7, 7);
        let slot = thresholds();
        let bytes = encode_values(&slot.fields, &initial_values(&slot, &mut defaults)).unwrap();
        assert_eq!(bytes.as_ref(), &[b'x', 0, 0, 0, 0]);
    }

    #[test]
    fn random_defaults_fit_their_fields() {
        let slot = SlotDescriptor::new(
            "mixed",
            vec![
                FieldDescriptor::scalar("flag", ElementType::Bool),
                FieldDescriptor::new("rgb", ElementType::UInt8, 3),
                FieldDescriptor::new("name", ElementType::Char, 4),
            ],
        );
        let mut defaults = DefaultValues::seeded(7, 7);
        let values = initial_values(&slot, &mut defaults);
        assert_eq!(values.len(), 3);
        let bytes = encode_values(&slot.fields, &values).unwrap();
        assert_eq!(bytes.len(), 1 + 3 + 4);
    }

    #[test]
    fn decoded_inputs_are_stored_verbatim() {
        let slot = thresholds();
        let values = decode_values(&slot.fields, &[b'>', 0x2A, 0, 0xFF, 0xFF, 0xEE]).unwrap();
        assert_eq!(
            values,
            vec![Value::Char('>'), Value::UInt(42), Value::UInt(u64::from(u16::MAX))]
        );
        assert!(matches!(
            decode_values(&slot.fields, &[b'>', 0x2A]),
            Err(ProtocolError::TruncatedPayload { .. })
        ));
    }
}
