//! Broadcast Message Bus
//!
//! Same-origin broadcast channel connecting the scanning context and the
//! lookup provider context. Every listener sees every envelope, including
//! the ones it posted itself, so receivers filter by source and drop
//! payloads they cannot parse.

use crate::domain::entities::ChannelMessage;
use crate::domain::ports::{ChannelError, LookupChannel};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Context name of the feed scanning side.
pub const CONTENT_CONTEXT: &str = "content";
/// Context name of the privileged lookup side.
pub const PAGE_CONTEXT: &str = "page";

/// A message as it travels on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Context that posted the message
    pub source: String,
    /// Untrusted payload
    pub data: serde_json::Value,
}

/// Broadcast bus shared by all contexts of one page.
#[derive(Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<Envelope>,
}

impl BroadcastBus {
    /// Create a bus buffering up to `capacity` envelopes per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Open an endpoint for `local`, accepting messages from `local` and `peer`.
    pub fn endpoint(&self, local: &str, peer: &str) -> (BusSender, BusInbox) {
        let sender = BusSender {
            source: local.to_string(),
            tx: self.tx.clone(),
        };
        let inbox = BusInbox {
            rx: self.tx.subscribe(),
            local: local.to_string(),
            peer: peer.to_string(),
        };
        (sender, inbox)
    }

    /// Post a raw envelope, as any script on the page could.
    pub fn post_raw(&self, envelope: Envelope) -> Result<(), ChannelError> {
        self.tx.send(envelope).map(|_| ()).map_err(|_| ChannelError::Closed)
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Sending half of an endpoint; stamps every message with its context.
#[derive(Clone)]
pub struct BusSender {
    source: String,
    tx: broadcast::Sender<Envelope>,
}

impl LookupChannel for BusSender {
    fn post(&self, message: &ChannelMessage) -> Result<(), ChannelError> {
        let envelope = Envelope {
            source: self.source.clone(),
            data: serde_json::to_value(message)?,
        };
        self.tx
            .send(envelope)
            .map(|_| ())
            .map_err(|_| ChannelError::Closed)
    }
}

/// Receiving half of an endpoint.
pub struct BusInbox {
    rx: broadcast::Receiver<Envelope>,
    local: String,
    peer: String,
}

impl BusInbox {
    /// Receive the next well-formed message from an accepted source.
    ///
    /// Returns `None` once every sender is gone. Cancel safe.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) => {
                    if let Some(message) = self.accept(envelope) {
                        return Some(message);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, context = %self.local, "bus receiver lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accept(&self, envelope: Envelope) -> Option<ChannelMessage> {
        if envelope.source != self.local && envelope.source != self.peer {
            tracing::trace!(source = %envelope.source, "ignoring message from foreign context");
            return None;
        }

        match serde_json::from_value(envelope.data) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(source = %envelope.source, "ignoring malformed message: {}", e);
                None
            }
        }
    }
}
