mod broadcast_bus;
mod dashmap_location_cache;
mod http_location_provider;
mod memory_feed_dom;

pub use broadcast_bus::{BroadcastBus, BusInbox, BusSender, Envelope, CONTENT_CONTEXT, PAGE_CONTEXT};
pub use dashmap_location_cache::{DashMapLocationCache, DEFAULT_LOCATION_TTL};
pub use http_location_provider::{HttpLocationProvider, DEFAULT_RATE_LIMIT_WAIT};
pub use memory_feed_dom::{FeedDomError, MemoryFeedDom, NodeKind, SnapshotNode};
