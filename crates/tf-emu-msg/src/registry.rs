//! ---
//! emu_section: "03-messaging"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "In-process bus carrying raw protocol frames."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;

use crate::HandlerId;

/// Shared set of connected client handler ids.
///
/// Client fronts register and deregister ids; device runtimes only read the
/// current snapshot when fanning out callbacks and discovery answers.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<IndexSet<HandlerId>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler id; returns `false` if it was already present.
    pub fn register(&self, id: HandlerId) -> bool {
        let inserted = self.inner.write().insert(id.clone());
        if inserted {
            tracing::debug!(handler_id = %id, "handler registered");
        }
        inserted
    }

    /// Remove a handler id; returns whether it was present.
    pub fn deregister(&self, id: &HandlerId) -> bool {
        let removed = self.inner.write().shift_remove(id);
        if removed {
            tracing::debug!(handler_id = %id, "handler deregistered");
        }
        removed
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &HandlerId) -> bool {
        self.inner.read().contains(id)
    }

    /// Registered ids in registration order.
    pub fn snapshot(&self) -> Vec<HandlerId> {
        self.inner.read().iter().cloned().collect()
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
