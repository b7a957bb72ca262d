//! Waiter registry: maps a correlation uid to a one-shot delivery slot, so the read/dispatch path
//! can hand a reply back to whichever caller is blocked waiting on it.

use std::collections::HashMap;

use tokio::sync::{oneshot, Mutex};

use crate::{codec::Response, ClientError};

/// What a waiter's delivery slot eventually receives.
#[derive(Debug)]
pub enum Delivery {
    /// A matching synchronous response arrived.
    Response(Response),
    /// The registry was torn down (`cancel_all`) before a response arrived.
    Cancelled,
}

/// A single-use, closeable delivery slot. The receiving half of a registered waiter.
pub type WaiterSlot = oneshot::Receiver<Delivery>;

/// Registry of in-flight synchronous commands, keyed by correlation uid.
///
/// At most one waiter may be registered per uid at a time (enforced by `register`). Delivery is
/// non-blocking and consumes the waiter; a second delivery attempt for the same uid finds nothing
/// registered and is dropped with a warning.
#[derive(Default)]
pub struct WaiterRegistry {
    inner: Mutex<HashMap<String, oneshot::Sender<Delivery>>>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh waiter for `uid`. Fails with [`ClientError::DuplicateWaiter`] if one is
    /// already registered — this should never happen with a monotonic uid counter, but the
    /// invariant is enforced rather than assumed.
    pub async fn register(&self, uid: String) -> Result<WaiterSlot, ClientError> {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.inner.lock().await;
        if guard.contains_key(&uid) {
            return Err(ClientError::DuplicateWaiter);
        }
        guard.insert(uid, tx);
        Ok(rx)
    }

    /// Delivers `response` to the waiter registered for `response.uid`, if any. Idempotent: a
    /// response for an unknown or already-delivered uid is logged and dropped.
    pub async fn deliver(&self, response: Response) {
        let uid = response.uid.clone();
        let sender = self.inner.lock().await.remove(&uid);
        match sender {
            Some(tx) => {
                if tx.send(Delivery::Response(response)).is_err() {
                    tracing::debug!(uid, "waiter dropped before its response arrived");
                }
            }
            None => {
                tracing::warn!(uid, "dropping response for unknown or already-delivered waiter");
            }
        }
    }

    /// Removes a waiter without delivering anything. Idempotent. Called on every exit path of a
    /// command (timeout, shutdown, success) to guarantee no waiter outlives its caller.
    pub async fn remove(&self, uid: &str) {
        self.inner.lock().await.remove(uid);
    }

    /// Closes every registered waiter's slot, delivering `Delivery::Cancelled`. Called before the
    /// client transitions away from `Connected`/`Reconnecting` toward `Disconnected`/`Closed`.
    pub async fn cancel_all(&self) {
        let mut guard = self.inner.lock().await;
        for (uid, tx) in guard.drain() {
            if tx.send(Delivery::Cancelled).is_err() {
                tracing::trace!(uid, "cancelled waiter already abandoned");
            }
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
