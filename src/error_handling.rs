//! Error types shared by every subsystem.
//!
//! Recoverable failures ([`types::GroupActivityError`]) travel to the delegate,
//! caller-contract violations ([`types::ContractViolation`]) stop the handler.

pub mod types;
