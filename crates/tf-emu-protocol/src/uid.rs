//! ---
//! emu_section: "02-protocol"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "TFP wire protocol primitives and codecs."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Base58 UID handling.
//!
//! Devices are configured with their printable UID (`"abc"`, `"6Jm1Dk"`);
//! the wire header carries the numeric 32-bit form.
use crate::{ProtocolError, Result};

const ALPHABET: &[u8; 58] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Decode a base58 UID into its 32-bit wire identity.
///
/// Values wider than 32 bits are folded the way the vendor bindings do it.
pub fn decode(uid: &str) -> Result<u32> {
    let invalid = || ProtocolError::InvalidUid(uid.to_owned());
    if uid.is_empty() {
        return Err(invalid());
    }
    let mut value: u64 = 0;
    for ch in uid.bytes() {
        let digit = ALPHABET
            .iter()
            .position(|candidate| *candidate == ch)
            .ok_or_else(invalid)?;
        value = value
            .checked_mul(58)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or_else(invalid)?;
    }
    Ok(fold(value))
}

/// Encode a 32-bit identity as base58.
pub fn encode(mut value: u32) -> String {
    if value == 0 {
        return (ALPHABET[0] as char).to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 58) as usize]);
        value /= 58;
    }
    digits.iter().rev().map(|b| *b as char).collect()
}

fn fold(value: u64) -> u32 {
    if value <= u64::from(u32::MAX) {
        return value as u32;
    }
    let low = (value & 0xFFFF_FFFF) as u32;
    let high = (value >> 32) as u32;
    (low & 0x0000_0FFF)
        | ((low & 0x0F00_0000) >> 12)
        | ((high & 0x0000_003F) << 16)
        | ((high & 0x000F_0000) << 6)
        | ((high & 0x3F00_0000) << 2)
}
