//! Domain Layer
//!
//! Pure filtering logic and the ports it talks through. Nothing in here
//! knows about tokio tasks, the message bus or HTTP.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
