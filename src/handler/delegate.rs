use log::trace;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::callback_queue::CallbackQueue;
use crate::error_handling::types::GroupActivityError;

/// Callbacks a UI consumer implements to follow a group activity.
///
/// All three run on the handler's [`CallbackQueue`], never concurrently with
/// one another.
pub trait GroupActivityDelegate<M>: Send + Sync + 'static {
    /// `can_connect`, `is_connected` or `participant_count` changed.
    fn state_changed(&self);

    /// A remote participant sent `message`.
    fn message_received(&self, message: M);

    /// A recoverable failure happened (activation, send, channel).
    fn report_error(&self, error: GroupActivityError);
}

/// Marshals delegate calls onto the callback lane. Notifications still queued
/// when the handler is torn down are dropped instead of delivered.
pub(crate) struct DelegateDispatcher<M> {
    delegate: Arc<dyn GroupActivityDelegate<M>>,
    queue: CallbackQueue,
    torn_down: CancellationToken,
}

impl<M: Send + 'static> DelegateDispatcher<M> {
    pub(crate) fn new(
        delegate: Arc<dyn GroupActivityDelegate<M>>,
        queue: CallbackQueue,
        torn_down: CancellationToken,
    ) -> Self {
        Self {
            delegate,
            queue,
            torn_down,
        }
    }

    pub(crate) fn state_changed(&self) {
        self.dispatch(|delegate| delegate.state_changed());
    }

    pub(crate) fn message_received(&self, message: M) {
        self.dispatch(move |delegate| delegate.message_received(message));
    }

    pub(crate) fn report_error(&self, error: GroupActivityError) {
        self.dispatch(move |delegate| delegate.report_error(error));
    }

    fn dispatch(&self, call: impl FnOnce(&dyn GroupActivityDelegate<M>) + Send + 'static) {
        if self.torn_down.is_cancelled() {
            return;
        }
        let delegate = Arc::clone(&self.delegate);
        let torn_down = self.torn_down.clone();
        self.queue.post(Box::new(move || {
            if torn_down.is_cancelled() {
                trace!("Dropping notification queued before teardown");
                return;
            }
            call(delegate.as_ref());
        }));
    }
}
