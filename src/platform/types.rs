//! Identifiers and value types exchanged with the platform.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Platform-assigned identifier of one shared session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Identifier of one participant device within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session as seen by the local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLifecycle {
    /// Offered to the device, not joined yet.
    Waiting,
    /// The local participant joined; the channel can be opened.
    Joined,
    /// Session ended or the local participant left. Terminal.
    Invalidated(String),
}

impl SessionLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionLifecycle::Invalidated(_))
    }
}

/// Undecoded message as delivered by the channel transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub sender: ParticipantId,
    pub bytes: Vec<u8>,
}
