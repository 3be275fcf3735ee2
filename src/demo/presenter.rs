//! Screen model of one simulated device.
//!
//! The sample apps show three status labels (eligibility, connection,
//! participant count) above the selected picture. `DevicePresenter` is the
//! delegate that keeps those labels current and logs every change.

use log::{info, warn};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tokio::sync::watch;

use crate::activity::catalog::{ChooseColorMessage, ChoosePuppyMessage};
use crate::error_handling::types::GroupActivityError;
use crate::handler::{GroupActivityDelegate, HandlerStatus};

/// Message that carries something to show on screen.
pub trait Selection {
    fn title(&self) -> &str;
}

impl Selection for ChooseColorMessage {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Selection for ChoosePuppyMessage {
    fn title(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLines {
    pub eligibility: &'static str,
    pub connection: &'static str,
    pub participants: String,
    pub selection: String,
}

impl StatusLines {
    pub fn new(status: &HandlerStatus, selection: Option<&str>) -> Self {
        Self {
            eligibility: if status.state.eligible {
                "Eligible"
            } else {
                "Not eligible"
            },
            connection: if status.state.is_connected() {
                "Connected"
            } else {
                "Not connected"
            },
            participants: format!("Participants: {}", status.state.participant_count),
            selection: selection.unwrap_or("Nothing selected").to_string(),
        }
    }
}

impl fmt::Display for StatusLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.eligibility, self.connection, self.participants, self.selection
        )
    }
}

#[derive(Default)]
struct Screen {
    selection: Option<String>,
    received: usize,
    errors: Vec<GroupActivityError>,
    history: Vec<StatusLines>,
}

pub struct DevicePresenter<M> {
    name: String,
    status: OnceLock<watch::Receiver<HandlerStatus>>,
    screen: Mutex<Screen>,
    _message: PhantomData<fn(M)>,
}

impl<M> DevicePresenter<M> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: OnceLock::new(),
            screen: Mutex::new(Screen::default()),
            _message: PhantomData,
        }
    }

    /// Connects the presenter to the status of the handler it displays.
    pub fn bind(&self, status: watch::Receiver<HandlerStatus>) {
        if self.status.set(status).is_err() {
            warn!("{}: presenter is already bound", self.name);
        }
        self.render(&mut self.screen());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shows a picture picked on this device.
    pub fn show(&self, title: &str) {
        let mut screen = self.screen();
        screen.selection = Some(title.to_string());
        self.render(&mut screen);
    }

    pub fn selection(&self) -> Option<String> {
        self.screen().selection.clone()
    }

    pub fn received(&self) -> usize {
        self.screen().received
    }

    pub fn errors(&self) -> Vec<GroupActivityError> {
        self.screen().errors.clone()
    }

    /// Every distinct set of status lines shown so far.
    pub fn history(&self) -> Vec<StatusLines> {
        self.screen().history.clone()
    }

    pub fn current(&self) -> Option<StatusLines> {
        self.screen().history.last().cloned()
    }

    fn screen(&self) -> MutexGuard<'_, Screen> {
        self.screen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn render(&self, screen: &mut Screen) {
        let Some(status) = self.status.get() else {
            return;
        };
        let lines = StatusLines::new(&status.borrow(), screen.selection.as_deref());
        if screen.history.last() != Some(&lines) {
            info!("[{}] {}", self.name, lines);
            screen.history.push(lines);
        }
    }
}

impl<M> GroupActivityDelegate<M> for DevicePresenter<M>
where
    M: Selection + Send + 'static,
{
    fn state_changed(&self) {
        self.render(&mut self.screen());
    }

    fn message_received(&self, message: M) {
        let mut screen = self.screen();
        screen.received += 1;
        screen.selection = Some(message.title().to_string());
        self.render(&mut screen);
    }

    fn report_error(&self, error: GroupActivityError) {
        warn!("[{}] {}", self.name, error);
        self.screen().errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::{HandlerState, SessionPhase, SessionPresence};

    fn status(eligible: bool, presence: SessionPresence, participant_count: usize) -> HandlerStatus {
        HandlerStatus {
            state: HandlerState {
                eligible,
                presence,
                participant_count,
            },
            phase: SessionPhase::WaitingForSessions,
        }
    }

    #[test]
    fn status_lines_read_like_the_apps() {
        let lines = StatusLines::new(&status(true, SessionPresence::Active, 2), Some("Red"));
        assert_eq!(lines.to_string(), "Eligible | Connected | Participants: 2 | Red");

        let lines = StatusLines::new(&status(false, SessionPresence::None, 0), None);
        assert_eq!(
            lines.to_string(),
            "Not eligible | Not connected | Participants: 0 | Nothing selected"
        );
    }

    #[test]
    fn presenter_tracks_messages_and_errors() {
        let (tx, rx) = watch::channel(status(true, SessionPresence::None, 0));
        let presenter: DevicePresenter<ChooseColorMessage> = DevicePresenter::new("phone");
        presenter.bind(rx);
        assert_eq!(presenter.history().len(), 1);

        tx.send_replace(status(true, SessionPresence::Active, 2));
        presenter.state_changed();
        presenter.message_received(ChooseColorMessage {
            file_name: "blue".to_string(),
            title: "Blue".to_string(),
        });
        presenter.report_error(GroupActivityError::NotConnected);

        assert_eq!(presenter.selection().as_deref(), Some("Blue"));
        assert_eq!(presenter.received(), 1);
        assert_eq!(presenter.errors(), vec![GroupActivityError::NotConnected]);
        assert_eq!(
            presenter.current().unwrap().to_string(),
            "Eligible | Connected | Participants: 2 | Blue"
        );
        assert_eq!(presenter.history().len(), 3);
    }

    #[test]
    fn unchanged_lines_are_not_repeated() {
        let (_tx, rx) = watch::channel(status(true, SessionPresence::None, 0));
        let presenter: DevicePresenter<ChoosePuppyMessage> = DevicePresenter::new("tablet");
        presenter.bind(rx);
        presenter.state_changed();
        presenter.state_changed();
        assert_eq!(presenter.history().len(), 1);
    }
}
