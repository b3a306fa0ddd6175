//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tf_emu_msg::{Envelope, HandlerId, HandlerRegistry, Transport};
use tracing::{debug, info};

/// Publishes device frames to client handler addresses.
#[derive(Clone)]
pub struct Outbound {
    transport: Arc<dyn Transport>,
    registry: HandlerRegistry,
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound")
            .field("transport", &self.transport.name())
            .field("handlers", &self.registry.len())
            .finish()
    }
}

impl Outbound {
    pub fn new(transport: Arc<dyn Transport>, registry: HandlerRegistry) -> Self {
        Self {
            transport,
            registry,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Answer a request: to the soliciting handler when known, otherwise to
    /// every registered handler.
    pub fn respond(&self, uid: &str, origin: Option<&HandlerId>, frame: Bytes) -> usize {
        match origin {
            Some(handler) => usize::from(self.send(uid, handler, frame)),
            None => self.to_all(uid, frame),
        }
    }

    /// Fan a callback or discovery answer out to every registered handler.
    pub fn to_all(&self, uid: &str, frame: Bytes) -> usize {
        let handlers = self.registry.snapshot();
        if handlers.is_empty() {
            info!(uid, "no handlerids registered, nothing sent");
            return 0;
        }
        handlers
            .iter()
            .filter(|handler| self.send(uid, handler, frame.clone()))
            .count()
    }

    fn send(&self, uid: &str, handler: &HandlerId, frame: Bytes) -> bool {
        match self.transport.publish(handler.as_str(), Envelope::new(frame)) {
            Ok(_) => true,
            Err(err) => {
                debug!(uid, handler_id = %handler, error = %err, "publish skipped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_emu_msg::InMemoryBus;

    #[test]
    fn responses_prefer_the_origin() {
        let bus = InMemoryBus::new();
        let registry = HandlerRegistry::new();
        registry.register("a".into());
        registry.register("b".into());
        let mut a = bus.subscribe("a");
        let mut b = bus.subscribe("b");
        let outbound = Outbound::new(Arc::new(bus.clone()), registry);

        assert_eq!(outbound.respond("abc", Some(&"b".into()), Bytes::from_static(&[1])), 1);
        assert!(a.try_recv().is_err());
        assert_eq!(b.try_recv().unwrap().frame.as_ref(), &[1]);

        assert_eq!(outbound.respond("abc", None, Bytes::from_static(&[2])), 2);
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[test]
    fn missing_subscribers_are_not_fatal() {
        let bus = InMemoryBus::new();
        let registry = HandlerRegistry::new();
        let outbound = Outbound::new(Arc::new(bus.clone()), registry.clone());
        assert_eq!(outbound.to_all("abc", Bytes::new()), 0);

        registry.register("gone".into());
        assert_eq!(outbound.to_all("abc", Bytes::new()), 0);
        assert_eq!(bus.metrics().dropped, 1);
    }
}
