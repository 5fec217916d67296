//! Location Provider Port
//!
//! Defines the interface for the privileged service that knows where an
//! author is based.

use crate::domain::value_objects::AuthorId;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result of asking the provider about one author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// The lookup completed. `None` means no location is known.
    Resolved(Option<String>),
    /// The provider refused the lookup until its window resets.
    RateLimited {
        /// Unix timestamp (seconds) of the reset, 0 when unknown
        reset_time: u64,
        /// Estimated wait before retrying
        wait: Duration,
    },
}

/// Errors raised by a location provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned unexpected status {0}")]
    UnexpectedStatus(u16),
}

/// Resolver for author locations.
///
/// This is an outbound port used by the page-scope peer of the lookup
/// channel. Implementations may call an HTTP API or a fixed table.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Look up where an author is based.
    async fn lookup(&self, author: &AuthorId) -> Result<LookupOutcome, ProviderError>;
}
