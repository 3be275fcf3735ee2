//! Group activity handler
//!
//! `GroupActivityHandler` is the façade UI code talks to. It is generic over
//! the activity type `A` and the message payload `M`, and hides the session
//! state machine, the message router and the platform behind a handful of
//! non-blocking calls and three delegate callbacks.
//!
//! ## Architecture
//!
//! ```text
//!  UI ──activate/send/reset──▶ ┌────────────────┐ ──sessions/activate──▶ platform
//!                              │  HandlerActor  │ ◀──offers/lifecycle──
//!  UI ◀──CallbackQueue──────── │ (single task)  │ ──send_raw──▶ channel
//!                              └────────────────┘ ◀──RouterEvent──
//! ```
//!
//! All mutation happens inside one actor task: user calls become commands on
//! an unbounded channel, platform signals are selected in the same loop. The
//! actor publishes a [`HandlerStatus`] snapshot for the synchronous queries
//! and posts delegate notifications to the [`CallbackQueue`] given at
//! construction.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use huddle::activity::catalog::{ChooseColorActivity, ChooseColorMessage};
//! use huddle::configuration::HandlerConfig;
//! use huddle::error_handling::types::GroupActivityError;
//! use huddle::handler::{CallbackQueue, GroupActivityDelegate, GroupActivityHandler};
//! use huddle::platform::loopback::LoopbackHub;
//!
//! struct Screen;
//!
//! impl GroupActivityDelegate<ChooseColorMessage> for Screen {
//!     fn state_changed(&self) {}
//!     fn message_received(&self, message: ChooseColorMessage) {
//!         println!("now showing {}", message.title);
//!     }
//!     fn report_error(&self, error: GroupActivityError) {
//!         eprintln!("{}", error);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = LoopbackHub::new();
//!     let handler = GroupActivityHandler::new(
//!         ChooseColorActivity,
//!         Arc::new(hub.device("phone")),
//!         Arc::new(Screen),
//!         CallbackQueue::spawn(),
//!         HandlerConfig::default(),
//!     );
//!     handler.begin_waiting_for_sessions();
//!     handler.activate();
//! }
//! ```

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::callback_queue::CallbackQueue;
use super::delegate::{DelegateDispatcher, GroupActivityDelegate};
use crate::activity::{ActivityDescriptor, GroupActivity};
use crate::configuration::types::HandlerConfig;
use crate::error_handling::types::{GroupActivityError, PlatformError};
use crate::message::GroupActivityMessage;
use crate::platform::{
    GroupSessionPlatform, ParticipantId, SessionHandle, SessionId, SessionLifecycle, SessionStream,
};
use crate::routing::{MessageRouter, RouterEvent};
use crate::session_management::{Effect, HandlerState, Outcome, SessionPhase, SessionStateMachine};

/// What the synchronous queries read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerStatus {
    pub state: HandlerState,
    pub phase: SessionPhase,
}

enum Command<M> {
    BeginWaiting,
    Activate,
    Send(M),
    Reset,
}

enum Internal {
    ActivationFinished {
        generation: u64,
        result: Result<(), PlatformError>,
    },
}

/// Coordinates one group activity for one device.
///
/// Dropping the handler tears it down: the current session is left, discovery
/// stops and no delegate callback fires afterwards.
pub struct GroupActivityHandler<A, M> {
    activity: A,
    descriptor: ActivityDescriptor,
    commands: mpsc::UnboundedSender<Command<M>>,
    status: watch::Receiver<HandlerStatus>,
    torn_down: CancellationToken,
    _payload: PhantomData<fn(M)>,
}

impl<A, M> GroupActivityHandler<A, M>
where
    A: GroupActivity,
    M: GroupActivityMessage,
{
    /// Creates the handler and starts its actor. Discovery does not start
    /// until [`begin_waiting_for_sessions`](Self::begin_waiting_for_sessions)
    /// or [`activate`](Self::activate).
    ///
    /// # Panics
    /// Must be called from within a tokio runtime. An activity without
    /// identifier is a contract violation.
    pub fn new(
        activity: A,
        platform: Arc<dyn GroupSessionPlatform>,
        delegate: Arc<dyn GroupActivityDelegate<M>>,
        callbacks: CallbackQueue,
        config: HandlerConfig,
    ) -> Self {
        let descriptor = activity.descriptor();
        let torn_down = CancellationToken::new();

        let mut eligibility = platform.eligibility();
        let eligible = *eligibility.borrow_and_update();
        let machine = SessionStateMachine::new(eligible, config.resubscribe_after_end);
        let (status_tx, status) = watch::channel(HandlerStatus {
            state: machine.snapshot(),
            phase: machine.phase(),
        });

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let actor = HandlerActor {
            descriptor: descriptor.clone(),
            platform,
            machine,
            router: MessageRouter::new(config.max_message_bytes),
            dispatcher: DelegateDispatcher::new(delegate, callbacks, torn_down.clone()),
            status: status_tx,
            commands: command_rx,
            eligibility: Some(eligibility),
            discovery: None,
            session: None,
            session_lifecycle: None,
            session_participants: None,
            router_tx,
            router_rx,
            internal_tx,
            internal_rx,
            generation: 0,
            router_epoch: 0,
            torn_down: torn_down.clone(),
        };

        info!("Starting group activity handler for {}", descriptor);
        tokio::spawn(actor.run());

        Self {
            activity,
            descriptor,
            commands,
            status,
            torn_down,
            _payload: PhantomData,
        }
    }

    /// Starts listening for sessions of this activity. Idempotent.
    pub fn begin_waiting_for_sessions(&self) {
        self.command(Command::BeginWaiting);
    }

    /// Asks the platform for a new session when `can_connect` holds; a no-op
    /// otherwise. The outcome arrives as a state change or a reported error.
    pub fn activate(&self) {
        self.command(Command::Activate);
    }

    /// Sends `message` to the other participants. Reported as
    /// [`GroupActivityError::NotConnected`] when no channel is attached.
    pub fn send(&self, message: M) {
        self.command(Command::Send(message));
    }

    /// Leaves the current session (if any) and waits for a new one.
    pub fn reset(&self) {
        self.command(Command::Reset);
    }

    /// Tears the handler down. Equivalent to dropping it.
    pub fn shutdown(&self) {
        self.torn_down.cancel();
    }

    pub fn can_connect(&self) -> bool {
        self.status.borrow().state.can_connect()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().state.is_connected()
    }

    pub fn participant_count(&self) -> usize {
        self.status.borrow().state.participant_count
    }

    pub fn state(&self) -> HandlerState {
        self.status.borrow().state
    }

    pub fn phase(&self) -> SessionPhase {
        self.status.borrow().phase
    }

    /// Receiver that observes every published status.
    pub fn watch_status(&self) -> watch::Receiver<HandlerStatus> {
        self.status.clone()
    }

    /// `false` once the actor stopped (teardown or contract violation).
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn descriptor(&self) -> &ActivityDescriptor {
        &self.descriptor
    }

    pub fn activity(&self) -> &A {
        &self.activity
    }

    fn command(&self, command: Command<M>) {
        if self.commands.send(command).is_err() {
            warn!("Handler for {} is no longer running", self.descriptor);
        }
    }
}

impl<A, M> Drop for GroupActivityHandler<A, M> {
    fn drop(&mut self) {
        self.torn_down.cancel();
    }
}

struct HandlerActor<M> {
    descriptor: ActivityDescriptor,
    platform: Arc<dyn GroupSessionPlatform>,
    machine: SessionStateMachine,
    router: MessageRouter<M>,
    dispatcher: DelegateDispatcher<M>,
    status: watch::Sender<HandlerStatus>,
    commands: mpsc::UnboundedReceiver<Command<M>>,
    eligibility: Option<watch::Receiver<bool>>,
    discovery: Option<SessionStream>,
    session: Option<SessionHandle>,
    session_lifecycle: Option<watch::Receiver<SessionLifecycle>>,
    session_participants: Option<watch::Receiver<BTreeSet<ParticipantId>>>,
    router_tx: mpsc::UnboundedSender<RouterEvent<M>>,
    router_rx: mpsc::UnboundedReceiver<RouterEvent<M>>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    /// Bumped by reset and teardown; pending activations of an older
    /// generation are discarded.
    generation: u64,
    /// Bumped per router attachment; router events of an older epoch are
    /// discarded.
    router_epoch: u64,
    torn_down: CancellationToken,
}

impl<M: GroupActivityMessage> HandlerActor<M> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.torn_down.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },

                changed = watch_changed(&mut self.eligibility) => match changed {
                    Some(eligible) => {
                        debug!("Eligibility for {} is now {}", self.descriptor, eligible);
                        let outcome = self.machine.eligibility_changed(eligible);
                        self.apply(outcome).await;
                    }
                    None => self.eligibility = None,
                },

                offered = next_session(&mut self.discovery) => match offered {
                    Some(handle) => self.on_session_offered(handle).await,
                    None => {
                        warn!("Session discovery for {} closed by the platform", self.descriptor);
                        self.discovery = None;
                    }
                },

                lifecycle = watch_changed(&mut self.session_lifecycle) => match lifecycle {
                    Some(lifecycle) => self.on_lifecycle(lifecycle).await,
                    None => {
                        self.session_lifecycle = None;
                        self.on_lifecycle(SessionLifecycle::Invalidated(
                            "session dropped by the platform".to_string(),
                        ))
                        .await;
                    }
                },

                participants = watch_changed(&mut self.session_participants) => match participants {
                    Some(participants) => self.on_participants(participants.len()).await,
                    None => self.session_participants = None,
                },

                Some(event) = self.router_rx.recv() => self.on_router_event(event),

                Some(internal) = self.internal_rx.recv() => self.on_internal(internal),
            }
        }

        self.teardown();
    }

    async fn on_command(&mut self, command: Command<M>) {
        match command {
            Command::BeginWaiting => {
                let outcome = self.machine.begin_waiting();
                self.apply(outcome).await;
            }
            Command::Activate => {
                let outcome = self.machine.activate();
                self.apply(outcome).await;
            }
            Command::Send(message) => {
                if let Err(e) = self.router.send(message).await {
                    warn!("Send on {} failed: {}", self.descriptor, e);
                    self.dispatcher.report_error(e);
                }
            }
            Command::Reset => {
                self.generation += 1;
                info!("Resetting handler for {}", self.descriptor);
                let outcome = self.machine.reset();
                self.apply(outcome).await;
            }
        }
    }

    async fn on_session_offered(&mut self, handle: SessionHandle) {
        let id = handle.id();
        let outcome = self
            .machine
            .session_offered(id, handle.participant_count());

        if outcome.effects.contains(&Effect::Join(id)) {
            info!("Adopting {} for {}", id, self.descriptor);
            let mut lifecycle = handle.watch_lifecycle();
            let mut participants = handle.watch_participants();
            let initial_lifecycle = lifecycle.borrow_and_update().clone();
            participants.borrow_and_update();
            self.session_lifecycle = Some(lifecycle);
            self.session_participants = Some(participants);
            self.session = Some(handle);
            self.apply(outcome).await;

            if initial_lifecycle != SessionLifecycle::Waiting {
                self.on_lifecycle(initial_lifecycle).await;
            }
        } else {
            debug!("Ignoring {}: a session is already current", id);
        }
    }

    async fn on_lifecycle(&mut self, lifecycle: SessionLifecycle) {
        let Some(id) = self.session.as_ref().map(SessionHandle::id) else {
            return;
        };

        let outcome = match lifecycle {
            SessionLifecycle::Waiting => return,
            SessionLifecycle::Joined => {
                let outcome = self.machine.session_joined(id);
                let count = self
                    .session
                    .as_ref()
                    .map(SessionHandle::participant_count)
                    .unwrap_or(0);
                let counted = self.machine.participants_changed(id, count);
                merge(outcome, counted)
            }
            SessionLifecycle::Invalidated(reason) => {
                info!("{} ended: {}", id, reason);
                self.machine.session_invalidated(id)
            }
        };
        self.apply(outcome).await;
    }

    async fn on_participants(&mut self, count: usize) {
        let Some(id) = self.session.as_ref().map(SessionHandle::id) else {
            return;
        };
        debug!("{} has {} active participant(s)", id, count);
        let outcome = self.machine.participants_changed(id, count);
        self.apply(outcome).await;
    }

    fn on_router_event(&mut self, event: RouterEvent<M>) {
        if event.epoch() != self.router_epoch || !self.router.is_attached() {
            trace!("Discarding router event of epoch {}", event.epoch());
            return;
        }

        match event {
            RouterEvent::Message {
                sender, payload, ..
            } => {
                debug!("Message `{}` from {}", M::MESSAGE_TYPE, sender);
                self.dispatcher.message_received(payload);
            }
            RouterEvent::Malformed { error, .. } => self.dispatcher.report_error(error),
            RouterEvent::ContractViolation { violation, .. } => {
                error!(
                    "Handler for {} received a message it was not built for",
                    self.descriptor
                );
                self.torn_down.cancel();
                self.teardown();
                violation.raise();
            }
            RouterEvent::ChannelClosed { .. } => {
                debug!("Channel of {} closed", self.descriptor);
            }
        }
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::ActivationFinished { generation, result } => {
                if generation != self.generation {
                    debug!("Discarding activation result of generation {}", generation);
                    return;
                }
                match result {
                    Ok(()) => debug!("Platform accepted activation of {}", self.descriptor),
                    Err(e) => {
                        warn!("Activation of {} failed: {}", self.descriptor, e);
                        self.dispatcher
                            .report_error(GroupActivityError::ActivationFailed(e));
                    }
                }
            }
        }
    }

    /// Publishes the new status, notifies the delegate, then carries out the
    /// outcome's effects in order.
    async fn apply(&mut self, outcome: Outcome) {
        for transition in &outcome.transitions {
            info!(
                "{}: {} -> {}",
                self.descriptor.identifier(),
                transition.from,
                transition.to
            );
        }

        self.publish();
        if outcome.state_changed {
            self.dispatcher.state_changed();
        }

        for effect in outcome.effects {
            match effect {
                Effect::Attach(id) => self.attach(id).await,
                other => self.perform(other),
            }
        }
        self.release_stale_session();
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::Subscribe => {
                debug!("Subscribing to sessions of {}", self.descriptor);
                self.discovery = Some(self.platform.sessions(&self.descriptor));
            }
            Effect::Unsubscribe => self.discovery = None,
            Effect::Join(id) => {
                if let Some(handle) = self.session.as_ref().filter(|h| h.id() == id) {
                    handle.join();
                }
            }
            Effect::Leave(id) => {
                if let Some(handle) = self.session.as_ref().filter(|h| h.id() == id) {
                    handle.leave();
                }
            }
            Effect::RequestActivation => self.request_activation(),
            Effect::Detach => self.router.detach(),
            Effect::Attach(_) => {}
        }
    }

    async fn attach(&mut self, id: SessionId) {
        let Some(handle) = self.session.clone().filter(|h| h.id() == id) else {
            return;
        };

        self.router_epoch += 1;
        let epoch = self.router_epoch;
        let result = tokio::select! {
            _ = self.torn_down.cancelled() => return,
            result = self.router.attach(&handle, epoch, self.router_tx.clone()) => result,
        };

        if let Err(e) = result {
            error!("Unable to attach to {}: {}", id, e);
            self.dispatcher.report_error(e);
        }
    }

    fn request_activation(&self) {
        let platform = Arc::clone(&self.platform);
        let descriptor = self.descriptor.clone();
        let generation = self.generation;
        let internal = self.internal_tx.clone();
        let torn_down = self.torn_down.clone();

        info!("Requesting a new session for {}", descriptor);
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = torn_down.cancelled() => return,
                result = platform.activate(&descriptor) => result,
            };
            let _ = internal.send(Internal::ActivationFinished { generation, result });
        });
    }

    /// Drops the handle and its watchers once the machine no longer tracks it.
    fn release_stale_session(&mut self) {
        let current = self.machine.current_session();
        if self.session.as_ref().map(SessionHandle::id) != current {
            self.session = None;
            self.session_lifecycle = None;
            self.session_participants = None;
        }
    }

    fn publish(&self) {
        self.status.send_replace(HandlerStatus {
            state: self.machine.snapshot(),
            phase: self.machine.phase(),
        });
    }

    fn teardown(&mut self) {
        self.generation += 1;
        let outcome = self.machine.teardown();
        for effect in outcome.effects {
            self.perform(effect);
        }
        self.release_stale_session();
        self.publish();
        info!("Handler for {} torn down", self.descriptor);
    }
}

fn merge(mut first: Outcome, second: Outcome) -> Outcome {
    first.transitions.extend(second.transitions);
    first.effects.extend(second.effects);
    first.state_changed |= second.state_changed;
    first
}

async fn next_session(discovery: &mut Option<SessionStream>) -> Option<SessionHandle> {
    match discovery {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

/// Resolves with the new value of `receiver`, or `None` once its sender is
/// gone. Never resolves while `receiver` is `None`.
async fn watch_changed<T: Clone>(receiver: &mut Option<watch::Receiver<T>>) -> Option<T> {
    match receiver {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
