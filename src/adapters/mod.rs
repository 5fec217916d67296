//! Adapters Layer
//!
//! Inbound adapters drive the application (the lookup provider peer);
//! outbound adapters implement the domain ports.

pub mod inbound;
pub mod outbound;
