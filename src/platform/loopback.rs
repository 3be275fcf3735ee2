//! In-process group session platform.
//!
//! `LoopbackHub` plays the role of the system service shared by every device
//! of a call: it keeps one live session per activity identifier, offers it to
//! every device subscribed to that activity, tracks who joined, and fans out
//! channel messages. Each device talks to the hub through its own
//! [`LoopbackPlatform`].
//!
//! Behavior
//! - Subscribing offers a session at most once to a given device. A device
//!   that left (or reset) is offered the same session again only when it
//!   calls `activate` while the session is still live.
//! - `send_raw` delivers to every open channel of the session, the sender's
//!   own included, the way a broadcast transport echoes back.
//! - When the last joined participant leaves, the session ends for everyone.
//!
//! Test controls (`fail_next_activation`, `fail_channel_open`, `end_session`,
//! `inject_raw`, ...) let callers drive failure paths deterministically.

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};

use super::platform_trait::{
    Channel, ChannelTransport, GroupSessionPlatform, SessionControl, SessionHandle, SessionStream,
};
use super::types::{ParticipantId, RawMessage, SessionId, SessionLifecycle};
use crate::activity::ActivityDescriptor;
use crate::error_handling::types::PlatformError;

struct DeviceState {
    name: String,
    eligibility: watch::Sender<bool>,
    subscribers: Vec<(String, mpsc::UnboundedSender<SessionHandle>)>,
    fail_next_activation: Option<PlatformError>,
    fail_channel_open: bool,
}

struct Member {
    lifecycle: watch::Sender<SessionLifecycle>,
    inbound: Option<mpsc::UnboundedSender<RawMessage>>,
    left: bool,
}

struct SharedSession {
    activity: String,
    participants: watch::Sender<BTreeSet<ParticipantId>>,
    members: HashMap<ParticipantId, Member>,
}

#[derive(Default)]
struct HubState {
    devices: HashMap<ParticipantId, DeviceState>,
    sessions: HashMap<SessionId, SharedSession>,
    live_by_activity: HashMap<String, SessionId>,
    transport_sends: usize,
}

/// Shared in-memory stand-in for the platform's session service.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new eligible device and returns its platform view.
    pub fn device(&self, name: &str) -> LoopbackPlatform {
        let participant = ParticipantId::new();
        let (eligibility, _) = watch::channel(true);

        self.state().devices.insert(
            participant,
            DeviceState {
                name: name.to_string(),
                eligibility,
                subscribers: Vec::new(),
                fail_next_activation: None,
                fail_channel_open: false,
            },
        );
        debug!("Loopback device `{}` registered as {}", name, participant);

        LoopbackPlatform {
            hub: self.clone(),
            participant,
        }
    }

    /// Live session for an activity identifier, if any.
    pub fn live_session(&self, activity: &str) -> Option<SessionId> {
        self.state().live_by_activity.get(activity).copied()
    }

    /// Number of joined participants in a session (0 once it ended).
    pub fn participant_count(&self, session: SessionId) -> usize {
        self.state()
            .sessions
            .get(&session)
            .map(|s| s.participants.borrow().len())
            .unwrap_or(0)
    }

    /// Number of `send_raw` calls the transport accepted so far.
    pub fn transport_send_count(&self) -> usize {
        self.state().transport_sends
    }

    /// Ends a session for every participant.
    pub fn end_session(&self, session: SessionId) {
        let mut state = self.state();
        Self::finish_session(&mut state, session, "session ended");
    }

    /// Delivers raw bytes on a session's channel as if `sender` had sent them.
    /// Bypasses the transport counter.
    pub fn inject_raw(&self, session: SessionId, sender: ParticipantId, bytes: Vec<u8>) {
        let state = self.state();
        if let Some(shared) = state.sessions.get(&session) {
            Self::fan_out(shared, RawMessage { sender, bytes });
        }
    }

    fn fan_out(shared: &SharedSession, message: RawMessage) {
        for member in shared.members.values() {
            if let Some(inbound) = &member.inbound {
                let _ = inbound.send(message.clone());
            }
        }
    }

    fn finish_session(state: &mut HubState, session: SessionId, reason: &str) {
        let Some(shared) = state.sessions.remove(&session) else {
            return;
        };

        info!("Loopback session {} finished: {}", session, reason);
        if state.live_by_activity.get(&shared.activity) == Some(&session) {
            state.live_by_activity.remove(&shared.activity);
        }

        shared.participants.send_modify(|set| set.clear());
        for member in shared.members.into_values() {
            member
                .lifecycle
                .send_replace(SessionLifecycle::Invalidated(reason.to_string()));
        }
    }

    /// Offers `session` to `participant` through its open subscribers, unless
    /// the device already saw it. With `rejoin`, a device that left the
    /// session is offered a fresh handle.
    fn offer(
        &self,
        state: &mut HubState,
        session: SessionId,
        participant: ParticipantId,
        rejoin: bool,
    ) {
        let Some(shared) = state.sessions.get_mut(&session) else {
            return;
        };
        if let Some(member) = shared.members.get(&participant) {
            if !(rejoin && member.left) {
                return;
            }
        }
        let Some(device) = state.devices.get_mut(&participant) else {
            return;
        };

        device.subscribers.retain(|(_, tx)| !tx.is_closed());
        let targets: Vec<_> = device
            .subscribers
            .iter()
            .filter(|(activity, _)| *activity == shared.activity)
            .map(|(_, tx)| tx.clone())
            .collect();
        if targets.is_empty() {
            return;
        }

        let (lifecycle, lifecycle_rx) = watch::channel(SessionLifecycle::Waiting);
        shared.members.insert(
            participant,
            Member {
                lifecycle,
                inbound: None,
                left: false,
            },
        );

        let handle = SessionHandle::new(
            session,
            participant,
            lifecycle_rx,
            shared.participants.subscribe(),
            Arc::new(LoopbackSessionControl {
                hub: self.clone(),
                session,
                participant,
            }),
        );

        debug!(
            "Offering {} to device `{}` ({})",
            session, device.name, participant
        );
        for tx in targets {
            let _ = tx.send(handle.clone());
        }
    }
}

/// One device's view of the [`LoopbackHub`].
#[derive(Clone)]
pub struct LoopbackPlatform {
    hub: LoopbackHub,
    participant: ParticipantId,
}

impl LoopbackPlatform {
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }

    pub fn set_eligible(&self, eligible: bool) {
        if let Some(device) = self.hub.state().devices.get(&self.participant) {
            device.eligibility.send_replace(eligible);
        }
    }

    /// Makes the next `activate` call fail with `error`.
    pub fn fail_next_activation(&self, error: PlatformError) {
        if let Some(device) = self.hub.state().devices.get_mut(&self.participant) {
            device.fail_next_activation = Some(error);
        }
    }

    /// Makes every `open_channel` call of this device fail while set.
    pub fn fail_channel_open(&self, fail: bool) {
        if let Some(device) = self.hub.state().devices.get_mut(&self.participant) {
            device.fail_channel_open = fail;
        }
    }
}

#[async_trait]
impl GroupSessionPlatform for LoopbackPlatform {
    fn eligibility(&self) -> watch::Receiver<bool> {
        match self.hub.state().devices.get(&self.participant) {
            Some(device) => device.eligibility.subscribe(),
            None => watch::channel(false).1,
        }
    }

    fn sessions(&self, activity: &ActivityDescriptor) -> SessionStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.hub.state();

        if let Some(device) = state.devices.get_mut(&self.participant) {
            device
                .subscribers
                .push((activity.identifier().to_string(), tx));
        }

        if let Some(live) = state.live_by_activity.get(activity.identifier()).copied() {
            self.hub.offer(&mut state, live, self.participant, false);
        }

        rx
    }

    async fn activate(&self, activity: &ActivityDescriptor) -> Result<(), PlatformError> {
        let mut state = self.hub.state();

        let device = state
            .devices
            .get_mut(&self.participant)
            .ok_or(PlatformError::Refused("unknown device".to_string()))?;
        if let Some(error) = device.fail_next_activation.take() {
            warn!("Loopback activation for {} refused: {}", activity, error);
            return Err(error);
        }
        if !*device.eligibility.borrow() {
            return Err(PlatformError::NotEligible);
        }

        if let Some(live) = state.live_by_activity.get(activity.identifier()).copied() {
            debug!("{} already has a live session, offering {}", activity, live);
            self.hub.offer(&mut state, live, self.participant, true);
            return Ok(());
        }

        let session = SessionId::new();
        let (participants, _) = watch::channel(BTreeSet::new());
        state.sessions.insert(
            session,
            SharedSession {
                activity: activity.identifier().to_string(),
                participants,
                members: HashMap::new(),
            },
        );
        state
            .live_by_activity
            .insert(activity.identifier().to_string(), session);
        info!("Loopback session {} started for {}", session, activity);

        let devices: Vec<ParticipantId> = state.devices.keys().copied().collect();
        for participant in devices {
            self.hub.offer(&mut state, session, participant, false);
        }

        Ok(())
    }
}

struct LoopbackSessionControl {
    hub: LoopbackHub,
    session: SessionId,
    participant: ParticipantId,
}

#[async_trait]
impl SessionControl for LoopbackSessionControl {
    fn join(&self) {
        let state = self.hub.state();
        let Some(shared) = state.sessions.get(&self.session) else {
            return;
        };
        let Some(member) = shared.members.get(&self.participant) else {
            return;
        };
        if member.lifecycle.borrow().is_terminal() {
            return;
        }

        member.lifecycle.send_replace(SessionLifecycle::Joined);
        shared.participants.send_modify(|set| {
            set.insert(self.participant);
        });
        debug!("{} joined {}", self.participant, self.session);
    }

    fn leave(&self) {
        let mut state = self.hub.state();
        let Some(shared) = state.sessions.get_mut(&self.session) else {
            return;
        };
        let Some(member) = shared.members.get_mut(&self.participant) else {
            return;
        };

        if member.left {
            return;
        }
        member.inbound = None;
        member.left = true;
        member
            .lifecycle
            .send_replace(SessionLifecycle::Invalidated("left".to_string()));
        let mut remaining = 0;
        shared.participants.send_modify(|set| {
            set.remove(&self.participant);
            remaining = set.len();
        });
        debug!(
            "{} left {}, {} participant(s) remaining",
            self.participant, self.session, remaining
        );

        if remaining == 0 {
            LoopbackHub::finish_session(&mut state, self.session, "all participants left");
        }
    }

    async fn open_channel(&self) -> Result<Channel, PlatformError> {
        let mut state = self.hub.state();

        let fail = state
            .devices
            .get(&self.participant)
            .map(|d| d.fail_channel_open)
            .unwrap_or(true);
        if fail {
            return Err(PlatformError::Refused("channel unavailable".to_string()));
        }

        let member = state
            .sessions
            .get_mut(&self.session)
            .and_then(|s| s.members.get_mut(&self.participant))
            .ok_or(PlatformError::SessionUnavailable)?;
        if *member.lifecycle.borrow() != SessionLifecycle::Joined {
            return Err(PlatformError::SessionUnavailable);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        member.inbound = Some(tx);

        Ok(Channel {
            transport: Arc::new(LoopbackTransport {
                hub: self.hub.clone(),
                session: self.session,
                sender: self.participant,
            }),
            inbound: rx,
        })
    }
}

struct LoopbackTransport {
    hub: LoopbackHub,
    session: SessionId,
    sender: ParticipantId,
}

#[async_trait]
impl ChannelTransport for LoopbackTransport {
    async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), PlatformError> {
        let mut state = self.hub.state();

        let open = state
            .sessions
            .get(&self.session)
            .ok_or(PlatformError::SessionUnavailable)?
            .members
            .get(&self.sender)
            .map(|m| m.inbound.is_some())
            .unwrap_or(false);
        if !open {
            return Err(PlatformError::ChannelClosed);
        }

        state.transport_sends += 1;
        trace!("{} -> {}: {} bytes", self.sender, self.session, bytes.len());
        if let Some(shared) = state.sessions.get(&self.session) {
            LoopbackHub::fan_out(
                shared,
                RawMessage {
                    sender: self.sender,
                    bytes,
                },
            );
        }

        Ok(())
    }
}
