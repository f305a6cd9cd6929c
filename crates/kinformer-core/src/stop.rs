//! Stop signals for informers and waiting callers.
//!
//! A [`StopHandle`] owns the signal; any number of [`StopSignal`]s observe
//! it. Firing is one-way: once stopped, a signal stays stopped.
//!
//! # Example
//!
//! ```rust
//! use kinformer_core::StopHandle;
//!
//! let handle = StopHandle::new();
//! let signal = handle.signal();
//! assert!(!signal.is_stopped());
//!
//! handle.stop();
//! assert!(signal.is_stopped());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Owner of a stop signal.
///
/// Clones share the same signal. Dropping every handle counts as stopping.
#[derive(Debug, Clone)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

#[derive(Debug)]
struct StopInner {
    /// Whether stop has been requested.
    fired: AtomicBool,
    /// Sender for the stop notification.
    tx: watch::Sender<bool>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    /// Create a new, unfired stop handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(StopInner {
                fired: AtomicBool::new(false),
                tx,
            }),
        }
    }

    /// Get a signal observing this handle.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Fire the signal. Later calls are no-ops.
    pub fn stop(&self) {
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!("stop requested");
            self.inner.tx.send_replace(true);
        }
    }

    /// Check if the signal has fired.
    pub fn is_stopped(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }
}

/// Observer side of a [`StopHandle`].
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Check if the signal has fired without waiting.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until the signal fires.
    pub async fn wait(mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Every handle dropped, treat as stopped
                return;
            }
        }
    }

    /// Wait until the signal fires, borrowing the signal.
    pub async fn stopped(&self) {
        self.clone().wait().await
    }
}
