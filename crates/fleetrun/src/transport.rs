//! # Packet Channels
//!
//! A minimal, async interface for moving packets between nodes.
//!
//! ## Philosophy
//!
//! - **Payload Agnostic**: A channel knows nothing about chains, values or handlers.
//!   It moves a channel id, an optional unique id and opaque bytes.
//! - **One Way**: Sending never waits for a reply. Correlating replies by unique id
//!   is the job of the `QueryManager`.

use bytes::Bytes;
use uuid::Uuid;

/// Errors at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The other end went away.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("i/o error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// The unit a `NetworkChannel` moves.
///
/// A `unique_id` on a request means the sender waits for a response echoing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub channel: i32,
    pub unique_id: Option<Uuid>,
    pub content: Bytes,
}

impl Packet {
    pub fn new(channel: i32, unique_id: Option<Uuid>, content: impl Into<Bytes>) -> Self {
        Self { channel, unique_id, content: content.into() }
    }
}

/// A connected, ordered and reliable packet sink.
///
/// Object safe, so channels are passed around as `Arc<dyn NetworkChannel>`.
#[async_trait::async_trait]
pub trait NetworkChannel: Send + Sync + 'static {
    /// Queues a packet for delivery to the other end.
    async fn send_packet(&self, packet: Packet) -> Result<()>;
}
