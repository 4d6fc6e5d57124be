//! In-process channels for tests and local wiring.

use tokio::sync::mpsc;

use crate::transport;
use crate::transport::NetworkChannel;
use crate::transport::Packet;
use crate::transport::TransportError;

/// One end of an in-process duplex link.
///
/// Packets sent on one end appear on the other end's receiver, in order.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Packet>,
}

impl MemoryChannel {
    /// Creates two connected ends together with the receivers that read what
    /// the opposite end sends: `(a, packets_for_a, b, packets_for_b)`.
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<Packet>,
        Self,
        mpsc::UnboundedReceiver<Packet>,
    ) {
        let (to_a, inbox_a) = mpsc::unbounded_channel();
        let (to_b, inbox_b) = mpsc::unbounded_channel();
        (Self { tx: to_b }, inbox_a, Self { tx: to_a }, inbox_b)
    }

    /// A channel whose sent packets land in the returned receiver.
    pub fn sink() -> (Self, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl NetworkChannel for MemoryChannel {
    async fn send_packet(&self, packet: Packet) -> transport::Result<()> {
        self.tx
            .send(packet)
            .map_err(|_| TransportError::ConnectionLost("channel closed".into()))
    }
}
