//! feed-geoblock Library
//!
//! This module exposes the feed filtering pipeline for use in integration
//! tests and as a library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{FeedFilterService, PipelineRuntime, PipelineState};
pub use config::load_config;
pub use domain::entities::{ChannelMessage, LocationRecord, MutationBatch};
pub use domain::ports::{FeedDom, LocationCache, LocationProvider, LookupChannel, LookupOutcome};
pub use domain::services::BlockDecision;
pub use domain::value_objects::{AuthorId, BlockList, NodeId, RequestToken};
pub use infrastructure::{ConfigBridge, ConfigDelta, FilterSettings, LookupQueue, LookupQueueConfig, ShutdownController};
