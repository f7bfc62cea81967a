//! Run-scoped cooperative cancellation.

use tokio::sync::watch;

use crate::error::{PublishError, Result};

/// Trips the paired [`CancelSignal`]s.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation of a run. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Creates a connected handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelSignal {
    /// A signal that is never tripped.
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Checkpoint between steps of a multi-step sequence.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PublishError::Cancelled)
        } else {
            Ok(())
        }
    }
}
