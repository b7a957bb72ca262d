//! Credential-refresh scheduler: one single-shot timer per TTL, rescheduled on success.
//!
//! `Client::schedule_refresh` owns cancellation of the previous timer; this function is just the
//! body that one timer task runs.

use std::{sync::Arc, time::Duration};

use crate::client::Client;

pub(crate) async fn run(client: Arc<Client>, ttl: Duration) {
    let shutdown = client.current_shutdown().await;
    tokio::select! {
        biased;
        _ = shutdown.wait() => return,
        _ = tokio::time::sleep(ttl) => {}
    }

    if shutdown.is_signalled() {
        return;
    }

    if let Err(err) = client.fire_refresh().await {
        tracing::error!(%err, "credential refresh failed");
        client.handlers().notify_error(&err);
    }
}
