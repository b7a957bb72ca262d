//! The shutdown signal: a one-shot broadcast, closing == signalled.
//!
//! Every blocking operation (command wait, read loop, write loop) selects on
//! [`Shutdown::wait`] alongside its own I/O. A fresh instance is allocated at each reconnect
//! attempt, which is why it lives behind an `Arc` rather than being cloned by value.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Default)]
pub struct Shutdown {
    signalled: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown. Idempotent.
    pub fn signal(&self) {
        self.signalled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }

    /// Resolves once `signal` has been called. Safe to call before or after the signal: the
    /// `Notified` future is constructed before the flag is checked, so a signal delivered
    /// between the check and the await is not missed.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        if self.is_signalled() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn wait_resolves_immediately_if_already_signalled() {
        let s = Shutdown::new();
        s.signal();
        s.wait().await;
    }

    #[tokio::test]
    async fn wait_resolves_when_signalled_concurrently() {
        let s = Arc::new(Shutdown::new());
        let s2 = s.clone();
        let waiter = tokio::spawn(async move {
            s2.wait().await;
        });
        tokio::task::yield_now().await;
        s.signal();
        waiter.await.unwrap();
    }
}
