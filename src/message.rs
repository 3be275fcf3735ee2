//! Typed application messages and their wire envelope.

pub mod envelope;

pub use envelope::{GroupActivityMessage, MessageEnvelope};
