//! Group activity handler subsystem.
//!
//! This module exposes the façade UI code instantiates per activity, the
//! delegate trait it reports through, and the callback lane notifications run
//! on.
//!
//! Re-exports:
//! - [`GroupActivityHandler`]: generic session handler (activate, send, reset).
//! - [`GroupActivityDelegate`]: the three callbacks a consumer implements.
//! - [`CallbackQueue`], [`CallbackReceiver`]: single-lane callback execution.

pub mod callback_queue;
pub mod delegate;
pub mod group_activity_handler;
#[cfg(test)]
pub mod test_support;
#[cfg(test)]
pub mod tests;

pub use callback_queue::{CallbackQueue, CallbackReceiver};
pub use delegate::GroupActivityDelegate;
pub use group_activity_handler::{GroupActivityHandler, HandlerStatus};
