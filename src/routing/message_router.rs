//! Typed message routing for one session channel.
//!
//! `MessageRouter` owns the single channel of the current session. Outbound
//! payloads are wrapped in a [`MessageEnvelope`], size checked and handed to
//! the platform transport. Inbound raw messages are pumped by a background
//! task that drops the local participant's own echoes, decodes the rest and
//! forwards them, in arrival order, as [`RouterEvent`]s tagged with the
//! attachment epoch so the owner can discard events from a channel it has
//! since let go.

use log::{debug, info, trace, warn};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error_handling::types::{ContractViolation, EnvelopeError, GroupActivityError};
use crate::message::{GroupActivityMessage, MessageEnvelope};
use crate::platform::{ChannelTransport, ParticipantId, RawMessage, SessionHandle, SessionId};

/// What the inbound pump reports to the router's owner.
#[derive(Debug)]
pub enum RouterEvent<M> {
    Message {
        epoch: u64,
        sender: ParticipantId,
        payload: M,
    },
    Malformed {
        epoch: u64,
        error: GroupActivityError,
    },
    ContractViolation {
        epoch: u64,
        violation: ContractViolation,
    },
    ChannelClosed {
        epoch: u64,
    },
}

impl<M> RouterEvent<M> {
    pub fn epoch(&self) -> u64 {
        match self {
            RouterEvent::Message { epoch, .. }
            | RouterEvent::Malformed { epoch, .. }
            | RouterEvent::ContractViolation { epoch, .. }
            | RouterEvent::ChannelClosed { epoch } => *epoch,
        }
    }
}

struct AttachedChannel {
    session: SessionId,
    local: ParticipantId,
    transport: Arc<dyn ChannelTransport>,
    pump: JoinHandle<()>,
}

pub struct MessageRouter<M> {
    attached: Option<AttachedChannel>,
    max_message_bytes: usize,
    _payload: PhantomData<fn() -> M>,
}

impl<M: GroupActivityMessage> MessageRouter<M> {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            attached: None,
            max_message_bytes,
            _payload: PhantomData,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    pub fn attached_session(&self) -> Option<SessionId> {
        self.attached.as_ref().map(|a| a.session)
    }

    /// Opens `session`'s channel and starts pumping inbound messages into
    /// `events`. Any previous attachment is dropped first.
    ///
    /// Errors
    /// - [`GroupActivityError::ChannelOpenFailed`] when the platform cannot
    ///   open the channel; the router stays detached.
    pub async fn attach(
        &mut self,
        session: &SessionHandle,
        epoch: u64,
        events: mpsc::UnboundedSender<RouterEvent<M>>,
    ) -> Result<(), GroupActivityError> {
        self.detach();

        let channel = session
            .open_channel()
            .await
            .map_err(GroupActivityError::ChannelOpenFailed)?;
        let local = session.local_participant();

        let pump = tokio::spawn(pump_inbound::<M>(channel.inbound, local, epoch, events));
        self.attached = Some(AttachedChannel {
            session: session.id(),
            local,
            transport: channel.transport,
            pump,
        });

        info!("Router attached to {} (epoch {})", session.id(), epoch);
        Ok(())
    }

    /// Wraps `payload` and hands it to the transport.
    ///
    /// Errors
    /// - [`GroupActivityError::NotConnected`] when no channel is attached;
    ///   nothing reaches the transport.
    /// - [`GroupActivityError::MessageTooLarge`] above the configured limit.
    /// - [`GroupActivityError::TransportFailed`] when the transport rejects it.
    pub async fn send(&self, payload: M) -> Result<(), GroupActivityError> {
        let attached = self.attached.as_ref().ok_or(GroupActivityError::NotConnected)?;

        let bytes = MessageEnvelope::new(attached.local, payload)
            .encode()
            .map_err(|e| GroupActivityError::Encoding(e.to_string()))?;
        if bytes.len() > self.max_message_bytes {
            return Err(GroupActivityError::MessageTooLarge {
                size: bytes.len(),
                limit: self.max_message_bytes,
            });
        }

        trace!(
            "Sending {} bytes of `{}` on {}",
            bytes.len(),
            M::MESSAGE_TYPE,
            attached.session
        );
        attached
            .transport
            .send_raw(bytes)
            .await
            .map_err(GroupActivityError::TransportFailed)
    }

    /// Stops the inbound pump. Later sends fail with `NotConnected`.
    pub fn detach(&mut self) {
        if let Some(attached) = self.attached.take() {
            attached.pump.abort();
            debug!("Router detached from {}", attached.session);
        }
    }
}

impl<M> Drop for MessageRouter<M> {
    fn drop(&mut self) {
        if let Some(attached) = self.attached.take() {
            attached.pump.abort();
        }
    }
}

async fn pump_inbound<M: GroupActivityMessage>(
    mut inbound: mpsc::UnboundedReceiver<RawMessage>,
    local: ParticipantId,
    epoch: u64,
    events: mpsc::UnboundedSender<RouterEvent<M>>,
) {
    while let Some(raw) = inbound.recv().await {
        if raw.sender == local {
            trace!("Dropping own echo ({} bytes)", raw.bytes.len());
            continue;
        }

        let event = match MessageEnvelope::<M>::decode(&raw.bytes) {
            Ok(envelope) => RouterEvent::Message {
                epoch,
                sender: envelope.sender,
                payload: envelope.payload,
            },
            Err(EnvelopeError::TypeMismatch { expected, found }) => {
                RouterEvent::ContractViolation {
                    epoch,
                    violation: ContractViolation::UnexpectedMessageType { expected, found },
                }
            }
            Err(e) => {
                warn!("Undecodable message from {}: {}", raw.sender, e);
                RouterEvent::Malformed {
                    epoch,
                    error: GroupActivityError::MalformedMessage(e.to_string()),
                }
            }
        };

        if events.send(event).is_err() {
            return;
        }
    }

    debug!("Inbound channel closed (epoch {})", epoch);
    let _ = events.send(RouterEvent::ChannelClosed { epoch });
}
