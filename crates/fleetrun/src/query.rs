//! # Query Correlation
//!
//! Pairs outbound requests with their responses by unique id.
//!
//! Each request registers a oneshot slot keyed by a fresh `Uuid` before it is sent.
//! The node's inbound pump hands every response packet to `complete`, which wakes
//! the matching waiter. Timeouts only stop the local wait; a response that shows
//! up afterwards finds no slot and is dropped.

use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::transport;
use crate::transport::NetworkChannel;
use crate::transport::Packet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] transport::TransportError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("response channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Default)]
pub struct QueryManager {
    pending: DashMap<Uuid, oneshot::Sender<Packet>>,
}

impl QueryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a unique id and the receiver its response will arrive on.
    pub fn register(&self) -> (Uuid, oneshot::Receiver<Packet>) {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, rx)
    }

    /// Delivers a response to its waiter. Returns `false` for unknown or expired ids.
    pub fn complete(&self, packet: Packet) -> bool {
        let Some(id) = packet.unique_id else {
            tracing::trace!("response without unique id dropped");
            return false;
        };
        let Some((_, waiter)) = self.pending.remove(&id) else {
            tracing::trace!(unique_id = %id, "response for unknown query dropped");
            return false;
        };
        // The waiter may have given up in the meantime.
        waiter.send(packet).is_ok()
    }

    /// Forgets a pending query.
    pub fn cancel(&self, id: &Uuid) {
        self.pending.remove(id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sends `content` on `channel_id` and waits up to `timeout` for the response.
    ///
    /// The slot is released however the wait ends, including when the returned
    /// future is dropped before it resolves.
    pub async fn send_query(
        &self,
        channel: &dyn NetworkChannel,
        channel_id: i32,
        content: Bytes,
        timeout: Duration,
    ) -> Result<Packet> {
        let (id, rx) = self.register();
        let _slot = PendingSlot { manager: self, id };

        channel.send_packet(Packet::new(channel_id, Some(id), content)).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(packet)) => Ok(packet),
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                tracing::debug!(unique_id = %id, ?timeout, "query timed out");
                Err(Error::Timeout(timeout))
            }
        }
    }
}

/// Removes a registered query when its waiter goes away.
struct PendingSlot<'a> {
    manager: &'a QueryManager,
    id: Uuid,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        // Already gone once `complete` delivered the response.
        self.manager.cancel(&self.id);
    }
}
