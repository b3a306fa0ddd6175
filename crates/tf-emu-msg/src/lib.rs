//! ---
//! emu_section: "03-messaging"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "In-process bus carrying raw protocol frames."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Message bus between protocol clients and emulated devices.
//!
//! Frames travel as opaque [`Envelope`]s addressed by string: a device UID,
//! a client handler id, or [`BROADCAST`] for discovery.
#![warn(missing_docs)]

pub mod logging;
pub mod registry;
pub mod transport;
pub mod types;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Delivery failures reported by transports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessagingError {
    /// Nobody is subscribed to the address.
    #[error("no subscribers for address '{0}'")]
    NoSubscribers(String),
    /// Every subscriber of the address has gone away.
    #[error("channel closed for address '{0}'")]
    ChannelClosed(String),
}

pub use logging::{log_envelope, MessageDirection};
pub use registry::HandlerRegistry;
pub use transport::{BusMetrics, InMemoryBus, Transport};
pub use types::{Envelope, HandlerId, BROADCAST};
