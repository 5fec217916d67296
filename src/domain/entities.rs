//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the feed filtering domain:
//! cached author locations, document mutations and the lookup protocol.

use crate::domain::value_objects::{AuthorId, NodeId, RequestToken};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Last known location of an author.
///
/// A record with `location == None` is a negative result: the lookup
/// succeeded but the author has no discoverable country.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    /// Country name or code reported by the provider
    pub location: Option<String>,
    /// When the lookup completed
    pub resolved_at: Instant,
}

impl LocationRecord {
    /// Create a record resolved now.
    pub fn new(location: Option<String>) -> Self {
        Self {
            location,
            resolved_at: Instant::now(),
        }
    }

    /// A record is fresh while its age is strictly below the TTL.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.resolved_at) < ttl
    }
}

/// Nodes inserted into the document in one notification.
///
/// Each entry may be a single post or a whole subtree containing many.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<NodeId>,
}

impl MutationBatch {
    pub fn new(added: Vec<NodeId>) -> Self {
        Self { added }
    }
}

/// Messages exchanged between the scanning context and the lookup provider.
///
/// The wire form is JSON with a `type` tag and camelCase fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChannelMessage {
    /// Ask the provider to resolve one author.
    LookupRequest {
        author_id: AuthorId,
        request_token: RequestToken,
    },
    /// Result of a lookup. `location` is absent when nothing is known.
    LookupResponse {
        author_id: AuthorId,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        rate_limited: bool,
        #[serde(default)]
        request_token: Option<RequestToken>,
    },
    /// The provider is being throttled.
    RateLimitNotice {
        /// Unix timestamp (seconds) at which the provider window resets
        #[serde(default)]
        reset_time: u64,
        /// Client-side estimate of the wait, in milliseconds
        #[serde(default)]
        wait_duration: u64,
    },
}

impl ChannelMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LookupRequest { .. } => "lookupRequest",
            Self::LookupResponse { .. } => "lookupResponse",
            Self::RateLimitNotice { .. } => "rateLimitNotice",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ===== LocationRecord Tests =====

    #[test]
    fn test_record_fresh_within_ttl() {
        let record = LocationRecord::new(Some("France".to_string()));
        let ttl = Duration::from_secs(60);

        assert!(record.is_fresh(ttl, record.resolved_at));
        assert!(record.is_fresh(ttl, record.resolved_at + Duration::from_secs(59)));
    }

    #[test]
    fn test_record_stale_at_ttl_boundary() {
        let record = LocationRecord::new(None);
        let ttl = Duration::from_secs(60);

        assert!(!record.is_fresh(ttl, record.resolved_at + ttl));
        assert!(!record.is_fresh(ttl, record.resolved_at + Duration::from_secs(3600)));
    }

    // ===== ChannelMessage Wire Format Tests =====

    #[test]
    fn test_lookup_request_wire_format() {
        let token = RequestToken::generate();
        let msg = ChannelMessage::LookupRequest {
            author_id: AuthorId::new("alice"),
            request_token: token,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "lookupRequest",
                "authorId": "alice",
                "requestToken": token.to_string(),
            })
        );
    }

    #[test]
    fn test_lookup_response_optional_fields_default() {
        let msg: ChannelMessage = serde_json::from_value(json!({
            "type": "lookupResponse",
            "authorId": "bob",
        }))
        .unwrap();

        assert_eq!(
            msg,
            ChannelMessage::LookupResponse {
                author_id: AuthorId::new("bob"),
                location: None,
                rate_limited: false,
                request_token: None,
            }
        );
    }

    #[test]
    fn test_rate_limit_notice_parses() {
        let msg: ChannelMessage = serde_json::from_value(json!({
            "type": "rateLimitNotice",
            "resetTime": 1_700_000_000u64,
            "waitDuration": 60000,
        }))
        .unwrap();

        assert_eq!(
            msg,
            ChannelMessage::RateLimitNotice {
                reset_time: 1_700_000_000,
                wait_duration: 60000,
            }
        );
        assert_eq!(msg.kind(), "rateLimitNotice");
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        let payloads = vec![
            json!({ "type": "somethingElse" }),
            json!({ "type": "lookupResponse" }),
            json!({ "type": "lookupRequest", "authorId": "x", "requestToken": "not-a-uuid" }),
            json!("lookupResponse"),
            json!(null),
        ];

        for payload in payloads {
            assert!(
                serde_json::from_value::<ChannelMessage>(payload.clone()).is_err(),
                "accepted {}",
                payload
            );
        }
    }

    #[test]
    fn test_mutation_batch_new() {
        let batch = MutationBatch::new(vec![NodeId(1), NodeId(2)]);
        assert_eq!(batch.added.len(), 2);
    }
}
