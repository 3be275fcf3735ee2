//! Shared helpers for the handler tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::delegate::GroupActivityDelegate;
use super::{CallbackQueue, GroupActivityHandler};
use crate::activity::catalog::{ChooseColorActivity, ChooseColorMessage};
use crate::configuration::types::HandlerConfig;
use crate::error_handling::types::GroupActivityError;
use crate::platform::loopback::LoopbackPlatform;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StateChanged,
    Message(ChooseColorMessage),
    Error(GroupActivityError),
}

/// Delegate that records every notification and the thread it ran on.
#[derive(Default)]
pub struct Recorder {
    notifications: Mutex<Vec<Notification>>,
    threads: Mutex<Vec<Option<String>>>,
}

impl Recorder {
    fn record(&self, notification: Notification) {
        self.threads
            .lock()
            .unwrap()
            .push(std::thread::current().name().map(str::to_string));
        self.notifications.lock().unwrap().push(notification);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn threads(&self) -> Vec<Option<String>> {
        self.threads.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<ChooseColorMessage> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<GroupActivityError> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn state_changes(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|n| **n == Notification::StateChanged)
            .count()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }
}

impl GroupActivityDelegate<ChooseColorMessage> for Recorder {
    fn state_changed(&self) {
        self.record(Notification::StateChanged);
    }

    fn message_received(&self, message: ChooseColorMessage) {
        self.record(Notification::Message(message));
    }

    fn report_error(&self, error: GroupActivityError) {
        self.record(Notification::Error(error));
    }
}

pub type ColorHandler = GroupActivityHandler<ChooseColorActivity, ChooseColorMessage>;

pub fn color_handler(platform: &LoopbackPlatform) -> (ColorHandler, Arc<Recorder>) {
    color_handler_with(platform, HandlerConfig::default())
}

pub fn color_handler_with(
    platform: &LoopbackPlatform,
    config: HandlerConfig,
) -> (ColorHandler, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let handler = GroupActivityHandler::new(
        ChooseColorActivity,
        Arc::new(platform.clone()),
        recorder.clone(),
        CallbackQueue::spawn(),
        config,
    );
    (handler, recorder)
}

pub fn color(name: &str) -> ChooseColorMessage {
    ChooseColorMessage {
        file_name: name.to_string(),
        title: name.to_uppercase(),
    }
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for: {}", what);
}

/// Gives the actor and the callback lane time to process anything pending.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
