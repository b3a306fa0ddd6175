//! ---
//! emu_section: "03-messaging"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "In-process bus carrying raw protocol frames."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Address every device listens on for discovery requests.
pub const BROADCAST: &str = "broadcast";

/// Identifier of a connected protocol client; doubles as its bus address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(String);

impl HandlerId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for a new client connection.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Bus address responses for this client are published to.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A raw frame in transit, tagged with the client that sent it when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Handler id of the soliciting client.
    pub origin: Option<HandlerId>,
    /// Encoded packet.
    pub frame: Bytes,
}

impl Envelope {
    /// Envelope without a known origin.
    pub fn new(frame: impl Into<Bytes>) -> Self {
        Self {
            origin: None,
            frame: frame.into(),
        }
    }

    /// Envelope sent on behalf of `origin`.
    pub fn from_handler(origin: HandlerId, frame: impl Into<Bytes>) -> Self {
        Self {
            origin: Some(origin),
            frame: frame.into(),
        }
    }
}
