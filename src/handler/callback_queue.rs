//! Single-lane callback execution context.
//!
//! Every delegate notification of a handler is posted here and executed in
//! posting order, one at a time, on whichever lane drains the queue: a tokio
//! task ([`CallbackQueue::spawn`]), a dedicated OS thread
//! ([`CallbackQueue::dedicated_thread`]), or the caller's own loop through a
//! [`CallbackReceiver`] ([`CallbackQueue::channel`]).

use log::{debug, warn};
use std::fmt;
use tokio::sync::mpsc;

pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Posting side of a callback lane. Cheap to clone; all clones feed the same lane.
#[derive(Clone)]
pub struct CallbackQueue {
    tx: mpsc::UnboundedSender<Callback>,
}

/// Draining side of a callback lane created with [`CallbackQueue::channel`].
pub struct CallbackReceiver {
    rx: mpsc::UnboundedReceiver<Callback>,
}

impl CallbackQueue {
    pub fn channel() -> (CallbackQueue, CallbackReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CallbackQueue { tx }, CallbackReceiver { rx })
    }

    /// Lane backed by a tokio task.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        let (queue, receiver) = Self::channel();
        tokio::spawn(receiver.run());
        queue
    }

    /// Lane backed by a named OS thread, the way a UI main thread would run.
    pub fn dedicated_thread(name: &str) -> std::io::Result<Self> {
        let (queue, mut receiver) = Self::channel();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(callback) = receiver.rx.blocking_recv() {
                    callback();
                }
                debug!("Callback thread exiting");
            })?;
        Ok(queue)
    }

    /// Queues `callback`. Returns `false` when the lane is gone.
    pub fn post(&self, callback: Callback) -> bool {
        if self.tx.send(callback).is_err() {
            warn!("Callback lane closed, notification dropped");
            return false;
        }
        true
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl CallbackReceiver {
    /// Runs callbacks until every [`CallbackQueue`] clone is dropped.
    pub async fn run(mut self) {
        while let Some(callback) = self.rx.recv().await {
            callback();
        }
    }

    /// Runs whatever is queued right now without waiting. Returns how many
    /// callbacks ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }
}
