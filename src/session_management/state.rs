use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the session state machine.
///
/// Variants:
/// - `Idle`: no discovery subscription.
/// - `WaitingForSessions`: subscribed to discovery, no session yet.
/// - `SessionPending`: a session was adopted but not joined yet.
/// - `Connected`: the local participant joined; messages can flow.
/// - `Ended`: the session terminated. Transient unless automatic
///   resubscription is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    WaitingForSessions,
    SessionPending,
    Connected,
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::WaitingForSessions => write!(f, "waiting for sessions"),
            SessionPhase::SessionPending => write!(f, "session pending"),
            SessionPhase::Connected => write!(f, "connected"),
            SessionPhase::Ended => write!(f, "ended"),
        }
    }
}

/// Whether a session occupies the handler's single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionPresence {
    #[default]
    None,
    Pending,
    Active,
}

/// Snapshot of what the UI can observe.
///
/// `participant_count` is 0 whenever `presence` is not `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HandlerState {
    pub eligible: bool,
    pub presence: SessionPresence,
    pub participant_count: usize,
}

impl HandlerState {
    /// Eligible and no session already occupies the slot.
    pub fn can_connect(&self) -> bool {
        self.eligible && self.presence == SessionPresence::None
    }

    pub fn is_connected(&self) -> bool {
        self.presence == SessionPresence::Active
    }
}
