//! ---
//! emu_section: "03-messaging"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "In-process bus carrying raw protocol frames."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use tracing::trace;

use crate::Envelope;

/// Direction of the frame movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Frame published onto the bus.
    Outbound,
    /// Frame taken off the bus by a consumer.
    Inbound,
}

/// Emit a structured trace entry with the hex encoded frame.
pub fn log_envelope(direction: MessageDirection, address: &str, envelope: &Envelope) {
    trace!(
        address,
        origin = envelope.origin.as_ref().map(|id| id.as_str()).unwrap_or("-"),
        len = envelope.frame.len(),
        frame = %hex::encode(&envelope.frame),
        direction = ?direction,
        "bus activity"
    );
}
