//! Subscription registry: channel → `Sub` record, retained across reconnects and resubscribed
//! after each one.

use std::{collections::HashMap, sync::Arc};

use serde_json::value::RawValue;
use tokio::sync::{Mutex, RwLock};

use crate::{error::ClientError, handlers::SubHandlers};

/// A single channel subscription. Retained across reconnects; destroyed only by `unsubscribe` or
/// `close`.
///
/// Holds no strong reference back to the `Client`: commands issued from a `Sub`'s own handlers
/// must go through a cloned command handle, never an owning pointer to the `Client`, or
/// client/sub would keep each other alive.
pub struct Sub {
    pub channel: String,
    last_message_id: Mutex<Option<String>>,
    handlers: SubHandlers,
}

impl Sub {
    pub(crate) fn new(channel: String, last_message_id: Option<String>, handlers: SubHandlers) -> Self {
        Self { channel, last_message_id: Mutex::new(last_message_id), handlers }
    }

    pub async fn last_message_id(&self) -> Option<String> {
        self.last_message_id.lock().await.clone()
    }

    pub(crate) async fn set_last_message_id(&self, id: String) {
        *self.last_message_id.lock().await = Some(id);
    }

    pub(crate) fn dispatch_message(&self, body: &RawValue) {
        if let Some(cb) = &self.handlers.on_message {
            cb(self, body);
        }
    }

    pub(crate) fn dispatch_join(&self, body: &RawValue) {
        if let Some(cb) = &self.handlers.on_join {
            cb(self, body);
        }
    }

    pub(crate) fn dispatch_leave(&self, body: &RawValue) {
        if let Some(cb) = &self.handlers.on_leave {
            cb(self, body);
        }
    }

    pub(crate) fn dispatch_unsubscribe(&self) {
        if let Some(cb) = &self.handlers.on_unsubscribe {
            cb(self);
        }
    }
}

/// Registry of active subscriptions, keyed by channel name.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subs: RwLock<HashMap<String, Arc<Sub>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new `Sub`. Fails with [`ClientError::AlreadySubscribed`] if the channel already
    /// has one, rather than silently overwriting it and losing its `last_message_id`.
    pub async fn insert(&self, sub: Arc<Sub>) -> Result<(), ClientError> {
        let mut guard = self.subs.write().await;
        if guard.contains_key(&sub.channel) {
            return Err(ClientError::AlreadySubscribed(sub.channel.clone()));
        }
        guard.insert(sub.channel.clone(), sub);
        Ok(())
    }

    /// Removes and returns the `Sub` for `channel`, if any.
    pub async fn remove(&self, channel: &str) -> Option<Arc<Sub>> {
        self.subs.write().await.remove(channel)
    }

    /// Looks up the `Sub` for `channel` without holding any lock past the call: acquire read,
    /// clone the `Arc`, release. Dispatch never runs a handler while the registry lock is held.
    pub async fn get(&self, channel: &str) -> Option<Arc<Sub>> {
        self.subs.read().await.get(channel).cloned()
    }

    pub async fn contains(&self, channel: &str) -> bool {
        self.subs.read().await.contains_key(channel)
    }

    /// A point-in-time snapshot of all active subs, used to drive resubscribe after a reconnect
    /// and best-effort unsubscribe-all on close. Traversal order is unspecified.
    pub async fn snapshot(&self) -> Vec<Arc<Sub>> {
        self.subs.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.subs.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(channel: &str) -> Arc<Sub> {
        Arc::new(Sub::new(channel.to_string(), None, SubHandlers::default()))
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let reg = SubscriptionRegistry::new();
        reg.insert(sub("news")).await.unwrap();
        assert!(reg.get("news").await.is_some());
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let reg = SubscriptionRegistry::new();
        reg.insert(sub("news")).await.unwrap();
        let err = reg.insert(sub("news")).await.unwrap_err();
        assert!(matches!(err, ClientError::AlreadySubscribed(ch) if ch == "news"));
    }

    #[tokio::test]
    async fn remove_unknown_channel_is_a_noop() {
        let reg = SubscriptionRegistry::new();
        assert!(reg.remove("missing").await.is_none());
    }

    #[tokio::test]
    async fn last_message_id_updates_are_visible_through_the_registry() {
        let reg = SubscriptionRegistry::new();
        reg.insert(sub("news")).await.unwrap();
        let found = reg.get("news").await.unwrap();
        found.set_last_message_id("m1".into()).await;
        assert_eq!(reg.get("news").await.unwrap().last_message_id().await, Some("m1".into()));
    }
}
