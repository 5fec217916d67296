//! Lookup Provider Peer
//!
//! Page-scope side of the lookup channel. Answers `lookupRequest`
//! messages from the scanning context using a location provider.

use crate::adapters::outbound::{BusInbox, BusSender};
use crate::domain::entities::ChannelMessage;
use crate::domain::ports::{LocationProvider, LookupChannel, LookupOutcome};
use crate::domain::value_objects::{AuthorId, RequestToken};
use crate::infrastructure::shutdown::ShutdownController;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Provider peer - inbound adapter for lookup requests.
///
/// This adapter:
/// 1. Listens on the bus for lookup requests
/// 2. Resolves each author through the location provider
/// 3. Replies with a response, or a rate-limit notice when throttled
///
/// Requests are served one at a time in arrival order.
pub struct ProviderPeer {
    provider: Arc<dyn LocationProvider>,
    sender: BusSender,
    inbox: BusInbox,
    shutdown: ShutdownController,
}

impl ProviderPeer {
    /// Create a new provider peer.
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        sender: BusSender,
        inbox: BusInbox,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            provider,
            sender,
            inbox,
            shutdown,
        }
    }

    /// Run the peer on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Serve requests until shutdown or until the bus closes.
    pub async fn run(mut self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown.is_shutdown() {
            return;
        }
        tracing::info!("lookup provider peer listening");

        loop {
            let message = tokio::select! {
                message = self.inbox.recv() => message,
                _ = shutdown_rx.recv() => break,
            };

            let (author_id, request_token) = match message {
                Some(ChannelMessage::LookupRequest {
                    author_id,
                    request_token,
                }) => (author_id, request_token),
                Some(_) => continue,
                None => break,
            };

            let reply = tokio::select! {
                reply = self.resolve(author_id, request_token) => reply,
                _ = shutdown_rx.recv() => break,
            };

            if let Err(e) = self.sender.post(&reply) {
                tracing::warn!("failed to post {}: {}", reply.kind(), e);
            }
        }

        tracing::info!("lookup provider peer stopped");
    }

    /// Resolve one author into the reply to post.
    ///
    /// Provider failures become a response without a location.
    async fn resolve(&self, author_id: AuthorId, request_token: RequestToken) -> ChannelMessage {
        match self.provider.lookup(&author_id).await {
            Ok(LookupOutcome::Resolved(location)) => {
                tracing::debug!(author = %author_id, ?location, "lookup resolved");
                ChannelMessage::LookupResponse {
                    author_id,
                    location,
                    rate_limited: false,
                    request_token: Some(request_token),
                }
            }
            Ok(LookupOutcome::RateLimited { reset_time, wait }) => {
                let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(author = %author_id, reset_time, wait_ms, "provider rate limited");
                ChannelMessage::RateLimitNotice {
                    reset_time,
                    wait_duration: wait_ms,
                }
            }
            Err(e) => {
                tracing::warn!(author = %author_id, "lookup failed: {}", e);
                ChannelMessage::LookupResponse {
                    author_id,
                    location: None,
                    rate_limited: false,
                    request_token: Some(request_token),
                }
            }
        }
    }
}
