mod feed_dom;
mod location_cache;
mod location_provider;
mod lookup_channel;

pub use feed_dom::FeedDom;
pub use location_cache::LocationCache;
pub use location_provider::{LocationProvider, LookupOutcome, ProviderError};
pub use lookup_channel::{ChannelError, LookupChannel};
