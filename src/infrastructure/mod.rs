//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod config_bridge;
pub mod lookup_queue;
pub mod shutdown;

pub use config_bridge::{ConfigBridge, ConfigDelta, FilterSettings};
pub use lookup_queue::{Dispatch, DispatchPhase, Expired, LookupQueue, LookupQueueConfig};
pub use shutdown::{shutdown_signal, ShutdownController};
