//! Lookup Channel Port
//!
//! Defines the outbound side of the cross-context lookup protocol.

use crate::domain::entities::ChannelMessage;
use thiserror::Error;

/// Errors raised while posting to the lookup channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Nobody is listening on the channel any more
    #[error("lookup channel closed")]
    Closed,
    /// The message could not be encoded
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fire-and-forget sender towards the lookup provider.
///
/// The channel does not correlate requests and responses. The pipeline
/// keeps at most one request outstanding and matches replies by token.
pub trait LookupChannel: Send + Sync {
    /// Post a message to every listener on the channel.
    fn post(&self, message: &ChannelMessage) -> Result<(), ChannelError>;
}
