//! Session state machine.
//!
//! ```text
//!  Idle ──begin_waiting──▶ WaitingForSessions ──offer──▶ SessionPending
//!   ▲                           ▲      ▲                      │ joined
//!   │ teardown (any)            │      └──────reset──────┐    ▼
//!   │                           └──── Ended ◀─invalidated── Connected
//! ```
//!
//! Every input returns an [`Outcome`]: the transitions taken, the side
//! effects the owner must carry out, and whether the observable
//! [`HandlerState`] changed. The machine itself never touches the platform.

use log::debug;

use super::state::{HandlerState, SessionPhase, SessionPresence};
use crate::platform::types::SessionId;

/// Side effect requested by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start a fresh discovery stream, replacing any previous one.
    Subscribe,
    Unsubscribe,
    Join(SessionId),
    Leave(SessionId),
    RequestActivation,
    Attach(SessionId),
    Detach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub transitions: Vec<Transition>,
    pub effects: Vec<Effect>,
    pub state_changed: bool,
}

impl Outcome {
    pub fn is_noop(&self) -> bool {
        self.transitions.is_empty() && self.effects.is_empty() && !self.state_changed
    }
}

pub struct SessionStateMachine {
    phase: SessionPhase,
    eligible: bool,
    session: Option<SessionId>,
    reported_participants: usize,
    resubscribe_after_end: bool,
}

impl SessionStateMachine {
    pub fn new(eligible: bool, resubscribe_after_end: bool) -> Self {
        Self {
            phase: SessionPhase::Idle,
            eligible,
            session: None,
            reported_participants: 0,
            resubscribe_after_end,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }

    pub fn snapshot(&self) -> HandlerState {
        let presence = match self.phase {
            SessionPhase::SessionPending => SessionPresence::Pending,
            SessionPhase::Connected => SessionPresence::Active,
            _ => SessionPresence::None,
        };
        let participant_count = if presence == SessionPresence::Active {
            self.reported_participants
        } else {
            0
        };

        HandlerState {
            eligible: self.eligible,
            presence,
            participant_count,
        }
    }

    pub fn begin_waiting(&mut self) -> Outcome {
        self.step(|m, out| {
            if matches!(m.phase, SessionPhase::Idle | SessionPhase::Ended) {
                m.move_to(SessionPhase::WaitingForSessions, out);
                out.effects.push(Effect::Subscribe);
            }
        })
    }

    /// Requests a new session. Ignored unless `can_connect` holds; from
    /// `Idle` or `Ended` discovery starts first so the new session is adopted.
    pub fn activate(&mut self) -> Outcome {
        self.step(|m, out| {
            if !m.snapshot().can_connect() {
                debug!("activate ignored: cannot connect in phase {}", m.phase);
                return;
            }
            if matches!(m.phase, SessionPhase::Idle | SessionPhase::Ended) {
                m.move_to(SessionPhase::WaitingForSessions, out);
                out.effects.push(Effect::Subscribe);
            }
            out.effects.push(Effect::RequestActivation);
        })
    }

    /// A session was delivered by discovery. Only adopted when the slot is
    /// free; `participants` is the count the handle reported on arrival.
    pub fn session_offered(&mut self, session: SessionId, participants: usize) -> Outcome {
        self.step(|m, out| {
            if m.phase != SessionPhase::WaitingForSessions || m.session.is_some() {
                debug!("{} ignored in phase {}", session, m.phase);
                return;
            }
            m.session = Some(session);
            m.reported_participants = participants;
            m.move_to(SessionPhase::SessionPending, out);
            out.effects.push(Effect::Join(session));
        })
    }

    pub fn session_joined(&mut self, session: SessionId) -> Outcome {
        self.step(|m, out| {
            if !m.is_current(session) || m.phase != SessionPhase::SessionPending {
                return;
            }
            m.move_to(SessionPhase::Connected, out);
            out.effects.push(Effect::Attach(session));
        })
    }

    pub fn participants_changed(&mut self, session: SessionId, count: usize) -> Outcome {
        self.step(|m, _| {
            if m.is_current(session) {
                m.reported_participants = count;
            }
        })
    }

    /// Platform-driven end of the current session.
    pub fn session_invalidated(&mut self, session: SessionId) -> Outcome {
        self.step(|m, out| {
            if !m.is_current(session) {
                return;
            }
            if m.phase == SessionPhase::Connected {
                out.effects.push(Effect::Detach);
            }
            m.session = None;
            m.reported_participants = 0;
            m.move_to(SessionPhase::Ended, out);
            if m.resubscribe_after_end {
                m.move_to(SessionPhase::WaitingForSessions, out);
                out.effects.push(Effect::Subscribe);
            } else {
                out.effects.push(Effect::Unsubscribe);
            }
        })
    }

    pub fn eligibility_changed(&mut self, eligible: bool) -> Outcome {
        self.step(|m, _| m.eligible = eligible)
    }

    /// Deliberate disconnect: leave the current session and wait for a new one.
    pub fn reset(&mut self) -> Outcome {
        self.step(|m, out| match m.phase {
            SessionPhase::SessionPending | SessionPhase::Connected | SessionPhase::Ended => {
                if m.phase == SessionPhase::Connected {
                    out.effects.push(Effect::Detach);
                }
                if let Some(session) = m.session.take() {
                    out.effects.push(Effect::Leave(session));
                }
                m.reported_participants = 0;
                m.move_to(SessionPhase::WaitingForSessions, out);
                out.effects.push(Effect::Subscribe);
            }
            SessionPhase::Idle | SessionPhase::WaitingForSessions => {}
        })
    }

    pub fn teardown(&mut self) -> Outcome {
        self.step(|m, out| {
            if m.phase == SessionPhase::Connected {
                out.effects.push(Effect::Detach);
            }
            if let Some(session) = m.session.take() {
                out.effects.push(Effect::Leave(session));
            }
            if m.phase != SessionPhase::Idle {
                out.effects.push(Effect::Unsubscribe);
                m.move_to(SessionPhase::Idle, out);
            }
            m.reported_participants = 0;
        })
    }

    fn step(&mut self, apply: impl FnOnce(&mut Self, &mut Outcome)) -> Outcome {
        let before = self.snapshot();
        let mut outcome = Outcome::default();
        apply(self, &mut outcome);
        outcome.state_changed = before != self.snapshot();
        outcome
    }

    fn move_to(&mut self, to: SessionPhase, out: &mut Outcome) {
        debug!("session phase {} -> {}", self.phase, to);
        out.transitions.push(Transition {
            from: self.phase,
            to,
        });
        self.phase = to;
    }
}
