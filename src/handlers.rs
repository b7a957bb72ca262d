//! Host application callbacks: connection lifecycle handlers and per-subscription message/join/
//! leave handlers, each a boxed closure rather than a trait the host must implement.

use std::sync::Arc;

use serde_json::value::RawValue;

use crate::{credentials::Credentials, error::ClientError, subscription::Sub};

/// A private-channel signature obtained from the host application.
#[derive(Debug, Clone)]
pub struct PrivateSign {
    pub sign: String,
    pub info: String,
}

/// Client-wide handlers: connection lifecycle and credential/signature collaborators.
///
/// `on_refresh` is required once credentials carry a ttl (`expires == true`); `on_private_sub` is
/// required the first time a private channel is subscribed. Both absences are configuration
/// errors (`MissingRefreshHandler` / `MissingPrivateSignHandler`), not panics.
#[derive(Clone, Default)]
pub struct ClientHandlers {
    pub(crate) on_disconnect: Option<Arc<dyn Fn() + Send + Sync>>,
    pub(crate) on_error: Option<Arc<dyn Fn(&ClientError) + Send + Sync>>,
    pub(crate) on_refresh: Option<Arc<dyn Fn() -> Result<Credentials, ClientError> + Send + Sync>>,
    pub(crate) on_private_sub:
        Option<Arc<dyn Fn(&str, &str) -> Result<PrivateSign, ClientError> + Send + Sync>>,
}

impl ClientHandlers {
    pub fn builder() -> ClientHandlersBuilder {
        ClientHandlersBuilder::default()
    }

    pub(crate) fn notify_disconnect(&self) {
        if let Some(cb) = &self.on_disconnect {
            cb();
        }
    }

    pub(crate) fn notify_error(&self, err: &ClientError) {
        match &self.on_error {
            Some(cb) => cb(err),
            None => tracing::error!(%err, "unhandled client error (no OnError configured)"),
        }
    }
}

#[derive(Default)]
pub struct ClientHandlersBuilder {
    inner: ClientHandlers,
}

impl ClientHandlersBuilder {
    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.inner.on_disconnect = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.inner.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_refresh(
        mut self,
        f: impl Fn() -> Result<Credentials, ClientError> + Send + Sync + 'static,
    ) -> Self {
        self.inner.on_refresh = Some(Arc::new(f));
        self
    }

    pub fn on_private_sub(
        mut self,
        f: impl Fn(&str, &str) -> Result<PrivateSign, ClientError> + Send + Sync + 'static,
    ) -> Self {
        self.inner.on_private_sub = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> ClientHandlers {
        self.inner
    }
}

/// Per-subscription handlers, supplied when calling `Client::subscribe`.
///
/// Invoked on the dispatch task's own context: a handler must not block or issue nested
/// synchronous commands on that same task, or it will deadlock the dispatcher. Issuing a command
/// from within a handler is safe only if the handler schedules it onto a distinct task (e.g.
/// `tokio::spawn`).
#[derive(Clone, Default)]
pub struct SubHandlers {
    pub(crate) on_message: Option<Arc<dyn Fn(&Sub, &RawValue) + Send + Sync>>,
    pub(crate) on_join: Option<Arc<dyn Fn(&Sub, &RawValue) + Send + Sync>>,
    pub(crate) on_leave: Option<Arc<dyn Fn(&Sub, &RawValue) + Send + Sync>>,
    pub(crate) on_unsubscribe: Option<Arc<dyn Fn(&Sub) + Send + Sync>>,
}

impl SubHandlers {
    pub fn builder() -> SubHandlersBuilder {
        SubHandlersBuilder::default()
    }
}

#[derive(Default)]
pub struct SubHandlersBuilder {
    inner: SubHandlers,
}

impl SubHandlersBuilder {
    pub fn on_message(mut self, f: impl Fn(&Sub, &RawValue) + Send + Sync + 'static) -> Self {
        self.inner.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_join(mut self, f: impl Fn(&Sub, &RawValue) + Send + Sync + 'static) -> Self {
        self.inner.on_join = Some(Arc::new(f));
        self
    }

    pub fn on_leave(mut self, f: impl Fn(&Sub, &RawValue) + Send + Sync + 'static) -> Self {
        self.inner.on_leave = Some(Arc::new(f));
        self
    }

    pub fn on_unsubscribe(mut self, f: impl Fn(&Sub) + Send + Sync + 'static) -> Self {
        self.inner.on_unsubscribe = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> SubHandlers {
        self.inner
    }
}
