//! Application Layer
//!
//! Use cases wiring the domain to the ports, plus the task that runs them.

mod feed_filter_service;
mod pipeline_runtime;

pub use feed_filter_service::{rate_limit_deadline, FeedFilterService, PipelineState};
pub use pipeline_runtime::PipelineRuntime;
