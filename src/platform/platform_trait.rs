//! Platform traits
//!
//! This module defines the capabilities the group activity core consumes:
//! - `GroupSessionPlatform`: eligibility, session discovery and activation
//! - `SessionControl`: join/leave a session and open its message channel
//! - `ChannelTransport`: hand raw bytes to the session's transport
//!
//! All traits are object safe so a handler can hold them behind `Arc<dyn ...>`.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::types::{ParticipantId, RawMessage, SessionId, SessionLifecycle};
use crate::activity::ActivityDescriptor;
use crate::error_handling::types::PlatformError;

/// Lazy, unbounded sequence of sessions offered for one activity. Dropping the
/// receiver unsubscribes; calling [`GroupSessionPlatform::sessions`] again
/// restarts discovery.
pub type SessionStream = mpsc::UnboundedReceiver<SessionHandle>;

#[async_trait]
pub trait GroupSessionPlatform: Send + Sync {
    /// Observable eligibility of this device to start a group session.
    fn eligibility(&self) -> watch::Receiver<bool>;

    /// Subscribes to sessions matching `activity`.
    fn sessions(&self, activity: &ActivityDescriptor) -> SessionStream;

    /// Asks the platform to start a session for `activity`. On success the
    /// session is delivered through [`GroupSessionPlatform::sessions`].
    async fn activate(&self, activity: &ActivityDescriptor) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait SessionControl: Send + Sync {
    fn join(&self);

    fn leave(&self);

    async fn open_channel(&self) -> Result<Channel, PlatformError>;
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), PlatformError>;
}

/// An opened session channel: the outbound transport and the inbound queue.
pub struct Channel {
    pub transport: Arc<dyn ChannelTransport>,
    pub inbound: mpsc::UnboundedReceiver<RawMessage>,
}

/// Reference to one shared session, as handed out by the platform.
///
/// Cloning is cheap; clones observe the same session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    local_participant: ParticipantId,
    lifecycle: watch::Receiver<SessionLifecycle>,
    participants: watch::Receiver<BTreeSet<ParticipantId>>,
    control: Arc<dyn SessionControl>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        local_participant: ParticipantId,
        lifecycle: watch::Receiver<SessionLifecycle>,
        participants: watch::Receiver<BTreeSet<ParticipantId>>,
        control: Arc<dyn SessionControl>,
    ) -> Self {
        Self {
            id,
            local_participant,
            lifecycle,
            participants,
            control,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn local_participant(&self) -> ParticipantId {
        self.local_participant
    }

    pub fn lifecycle(&self) -> SessionLifecycle {
        self.lifecycle.borrow().clone()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.borrow().len()
    }

    /// Fresh receiver for lifecycle updates.
    pub fn watch_lifecycle(&self) -> watch::Receiver<SessionLifecycle> {
        self.lifecycle.clone()
    }

    /// Fresh receiver for the set of active participants.
    pub fn watch_participants(&self) -> watch::Receiver<BTreeSet<ParticipantId>> {
        self.participants.clone()
    }

    pub fn join(&self) {
        self.control.join()
    }

    pub fn leave(&self) {
        self.control.leave()
    }

    pub async fn open_channel(&self) -> Result<Channel, PlatformError> {
        self.control.open_channel().await
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("local_participant", &self.local_participant)
            .field("lifecycle", &*self.lifecycle.borrow())
            .field("participants", &self.participants.borrow().len())
            .finish()
    }
}
