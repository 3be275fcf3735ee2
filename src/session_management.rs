//! Session management core module.
//!
//! This module tracks the one group session a handler may hold: its phase,
//! the device eligibility and the participant count. The state machine is a
//! plain value driven by the handler's actor; it decides, the actor acts.

/// Submodule for handler-visible state snapshots and phases.
pub mod state;
/// Submodule for the session state machine.
pub mod state_machine;

pub use state::{HandlerState, SessionPhase, SessionPresence};
pub use state_machine::{Effect, Outcome, SessionStateMachine, Transition};
