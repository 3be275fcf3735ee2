//! Boundary with the platform's group-session machinery.
//!
//! The core never implements discovery or transport itself. It consumes the
//! traits in [`platform_trait`]; [`loopback`] is an in-process implementation
//! that simulates several devices sharing sessions, used by the demo binary
//! and by the tests.
//!
//! ```text
//! ┌──────────────────────┐ sessions()  ┌───────────────┐ open_channel() ┌─────────┐
//! │ GroupSessionPlatform │───────────▶│ SessionHandle │──────────────▶│ Channel │
//! └──────────────────────┘            └───────────────┘               └─────────┘
//!   eligibility(), activate()          lifecycle, participants         send_raw(), inbound
//! ```

pub mod loopback;
pub mod platform_trait;
pub mod types;

pub use platform_trait::{
    Channel, ChannelTransport, GroupSessionPlatform, SessionControl, SessionHandle, SessionStream,
};
pub use types::{ParticipantId, RawMessage, SessionId, SessionLifecycle};
