// src/transport/mod.rs
// Transport seam between the connection manager and the concrete wire. A
// transport dials one logical link; the link hands back a cheap control
// handle (subscribe/publish/liveness) plus a stream of decoded frames. The
// manager owns reconnect policy, the transport owns the wire.

pub mod jetstream;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Delivery-quality tier for pub/sub subscriptions and publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryQuality {
    /// Best-effort; used for outbound telemetry republish.
    AtMostOnce,
    /// Used for inbound consumption.
    AtLeastOnce,
}

impl DeliveryQuality {
    pub fn level(self) -> u8 {
        match self {
            DeliveryQuality::AtMostOnce => 0,
            DeliveryQuality::AtLeastOnce => 1,
        }
    }
}

/// One decoded inbound frame: the topic it arrived on and its raw payload.
/// Payloads stay raw here; event decoding (and its error policy) lives in the
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: String,
}

/// A live link as returned by a successful dial.
pub struct TransportLink {
    pub handle: std::sync::Arc<dyn LinkHandle>,
    pub events: mpsc::Receiver<InboundFrame>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt one handshake. Retrying is the caller's job.
    async fn dial(&self) -> Result<TransportLink>;
}

/// Control surface of a live link. Internally synchronized; the event stream
/// closing is the disconnect signal.
#[async_trait]
pub trait LinkHandle: Send + Sync {
    async fn subscribe(&self, topic: &str, quality: DeliveryQuality) -> Result<()>;
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
    /// The transport's own liveness view of this link.
    fn is_alive(&self) -> bool;
    async fn close(&self);
}
