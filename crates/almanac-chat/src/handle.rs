//! A cloneable handle for poking a running chat from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle onto the chat's in-flight state.
///
/// All fields are `Arc`-wrapped, so cloning is cheap. The handle lets a UI
/// cancel the in-flight model call without holding a borrow of the chat.
#[derive(Clone)]
pub struct ChatHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_running: Arc<AtomicBool>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_running: Arc::new(AtomicBool::new(false)),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Cancel the in-flight model call, if any. Best effort.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Get the cancellation token for the current call
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Whether a turn is currently being processed
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Wait until the chat becomes idle (no turn in flight)
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_running.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }
}
