//! ---
//! emu_section: "03-messaging"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "In-process bus carrying raw protocol frames."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::logging::{log_envelope, MessageDirection};
use crate::{Envelope, MessagingError, Result};

/// Transport abstraction used by device runtimes and client fronts.
pub trait Transport: Send + Sync {
    /// Deliver `envelope` to every subscriber of `address`; returns the
    /// number of subscribers reached.
    fn publish(&self, address: &str, envelope: Envelope) -> Result<usize>;
    /// Register a new subscriber for `address`.
    fn subscribe(&self, address: &str) -> mpsc::UnboundedReceiver<Envelope>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// Snapshot of bus activity counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusMetrics {
    /// Publish calls accepted by the bus.
    pub published: u64,
    /// Envelopes handed to a subscriber.
    pub delivered: u64,
    /// Publish calls that reached nobody.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BusMetrics {
        BusMetrics {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

type Subscribers = HashMap<String, Vec<mpsc::UnboundedSender<Envelope>>>;

/// In-process bus backed by unbounded tokio channels.
///
/// Cloning yields another handle onto the same bus. Subscribers whose
/// receiver was dropped are pruned on the next publish to their address.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    subscribers: Arc<RwLock<Subscribers>>,
    counters: Arc<Counters>,
}

impl InMemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on `address`.
    pub fn subscriber_count(&self, address: &str) -> usize {
        self.subscribers
            .read()
            .get(address)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Return the current counter snapshot.
    pub fn metrics(&self) -> BusMetrics {
        self.counters.snapshot()
    }
}

impl Transport for InMemoryBus {
    fn publish(&self, address: &str, envelope: Envelope) -> Result<usize> {
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        log_envelope(MessageDirection::Outbound, address, &envelope);

        let mut subscribers = self.subscribers.write();
        let Some(senders) = subscribers.get_mut(address) else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(MessagingError::NoSubscribers(address.to_owned()));
        };
        senders.retain(|tx| tx.send(envelope.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            subscribers.remove(address);
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(MessagingError::ChannelClosed(address.to_owned()));
        }
        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        Ok(delivered)
    }

    fn subscribe(&self, address: &str) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .entry(address.to_owned())
            .or_default()
            .push(tx);
        tracing::debug!(address, "subscribed");
        rx
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandlerId;

    #[tokio::test]
    async fn publish_fans_out_to_every_subscriber() -> anyhow::Result<()> {
        let bus = InMemoryBus::new();
        let mut first = bus.subscribe("abc");
        let mut second = bus.subscribe("abc");

        let reached = bus.publish(
            "abc",
            Envelope::from_handler(HandlerId::new("client"), vec![1u8, 2]),
        )?;
        assert_eq!(reached, 2);

        let got = first.recv().await.expect("first subscriber receives");
        assert_eq!(got.frame.as_ref(), &[1, 2]);
        assert_eq!(got.origin, Some(HandlerId::new("client")));
        assert!(second.recv().await.is_some());

        let metrics = bus.metrics();
        assert_eq!(metrics.published, 1);
        assert_eq!(metrics.delivered, 2);
        Ok(())
    }

    #[test]
    fn publishing_without_subscribers_is_reported() {
        let bus = InMemoryBus::new();
        assert_eq!(
            bus.publish("nobody", Envelope::new(vec![0u8])),
            Err(MessagingError::NoSubscribers("nobody".into()))
        );
        assert_eq!(bus.metrics().dropped, 1);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus = InMemoryBus::new();
        let keep = bus.subscribe("abc");
        drop(bus.subscribe("abc"));
        assert_eq!(bus.subscriber_count("abc"), 1);
        assert_eq!(bus.publish("abc", Envelope::new(vec![0u8])), Ok(1));

        drop(keep);
        assert_eq!(
            bus.publish("abc", Envelope::new(vec![0u8])),
            Err(MessagingError::ChannelClosed("abc".into()))
        );
        assert_eq!(bus.subscriber_count("abc"), 0);
    }
}
