//! Run cancellation
//!
//! One `CancelHandle` per run; every issuer pipeline and the forwarder
//! hold a clone of the matching `CancelSignal`.

use std::future::Future;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Fires the cancellation
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Observes the cancellation
#[derive(Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

/// Create a connected handle and signal
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelSignal { receiver })
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is dropped unfired
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `future` unless cancelled first; on cancellation the future is
    /// dropped at its current suspension point.
    pub async fn guard<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            result = future => result,
        }
    }
}
