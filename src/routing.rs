//! Message routing over the active session's channel.

pub mod message_router;

pub use message_router::{MessageRouter, RouterEvent};
