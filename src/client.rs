//! The client connection state machine and command layer.
//!
//! An `Arc`-shared handle whose constructors dial, run the connect handshake, and hand back a
//! ready-to-use client. State is split across three independently locked resources: a `Client`
//! lock around status/credentials/client id/send handle/shutdown signal, a `SubscriptionRegistry`
//! with its own lock, and a `WaiterRegistry` with its own lock. The subscription and waiter locks
//! are never held at the same time.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde_json::value::RawValue;
use tokio::sync::{mpsc, Mutex};

use crate::{
    backend,
    codec::{Command, Response, WireError},
    config::Config,
    credentials::Credentials,
    dispatch,
    error::ClientError,
    handlers::{ClientHandlers, PrivateSign, SubHandlers},
    reconnect::ReconnectStrategy,
    shapes::{
        ChannelParams, ConnectBody, ConnectParams, HistoryBody, MessageUid, PresenceBody,
        PublishParams, RefreshParams, StatusBody, SubscribeBody, SubscribeParams,
    },
    shutdown::Shutdown,
    status::Status,
    subscription::{Sub, SubscriptionRegistry},
    transport::{self, Dialer, Transport, TransportReader, TransportWriter},
    waiter::{Delivery, WaiterRegistry},
};

struct ClientState {
    status: Status,
    credentials: Credentials,
    client_id: String,
    send_tx: Option<mpsc::Sender<String>>,
    shutdown: Arc<Shutdown>,
    refresh_task: Option<tokio::task::JoinHandle<()>>,
}

/// A connected pub/sub client.
///
/// Always held behind an `Arc`: the read loop, write loop, dispatch loop, and refresh timer all
/// carry a clone so they can report failures and reach the command layer without a back-reference
/// cycle through `Sub`.
pub struct Client {
    url: String,
    config: Config,
    state: Mutex<ClientState>,
    subscriptions: SubscriptionRegistry,
    waiters: WaiterRegistry,
    handlers: ClientHandlers,
    next_uid: AtomicU64,
    reconnect_strategy: Box<dyn ReconnectStrategy>,
    dialer: Dialer,
}

impl Client {
    /// Dials `url` over a live WebSocket and completes the connect handshake before returning.
    #[tracing::instrument(skip_all, err)]
    pub async fn connect(
        url: impl Into<String>,
        credentials: Credentials,
        config: Config,
        handlers: ClientHandlers,
        reconnect_strategy: Box<dyn ReconnectStrategy>,
    ) -> Result<Arc<Client>, ClientError> {
        Self::connect_with_dialer(
            url,
            credentials,
            config,
            handlers,
            reconnect_strategy,
            transport::ws_dialer(),
        )
        .await
    }

    /// As [`Client::connect`], but dials through a caller-supplied [`Transport`] implementation
    /// instead of a live WebSocket. Intended for tests substituting an in-process fake.
    pub async fn connect_with<T: Transport + 'static>(
        url: impl Into<String>,
        credentials: Credentials,
        config: Config,
        handlers: ClientHandlers,
        reconnect_strategy: Box<dyn ReconnectStrategy>,
    ) -> Result<Arc<Client>, ClientError> {
        Self::connect_with_dialer(
            url,
            credentials,
            config,
            handlers,
            reconnect_strategy,
            transport::dialer_for::<T>(),
        )
        .await
    }

    async fn connect_with_dialer(
        url: impl Into<String>,
        credentials: Credentials,
        config: Config,
        handlers: ClientHandlers,
        reconnect_strategy: Box<dyn ReconnectStrategy>,
        dialer: Dialer,
    ) -> Result<Arc<Client>, ClientError> {
        let client = Arc::new(Client {
            url: url.into(),
            config,
            state: Mutex::new(ClientState {
                status: Status::Disconnected,
                credentials,
                client_id: String::new(),
                send_tx: None,
                shutdown: Arc::new(Shutdown::new()),
                refresh_task: None,
            }),
            subscriptions: SubscriptionRegistry::new(),
            waiters: WaiterRegistry::new(),
            handlers,
            next_uid: AtomicU64::new(1),
            reconnect_strategy,
            dialer,
        });

        client.dial_and_bring_up().await?;
        Ok(client)
    }

    async fn dial_and_bring_up(self: &Arc<Self>) -> Result<(), ClientError> {
        let (reader, writer) = (self.dialer)(self.url.clone()).await?;
        self.bring_up(reader, writer).await
    }

    async fn bring_up(
        self: &Arc<Self>,
        reader: Box<dyn TransportReader>,
        writer: Box<dyn TransportWriter>,
    ) -> Result<(), ClientError> {
        let (send_tx, send_rx) = mpsc::channel(self.config.send_queue_capacity);
        let (recv_tx, recv_rx) = mpsc::channel(self.config.recv_queue_capacity);
        let shutdown = Arc::new(Shutdown::new());

        {
            let mut state = self.state.lock().await;
            state.send_tx = Some(send_tx);
            state.shutdown = shutdown.clone();
        }

        backend::spawn_read_loop(Arc::clone(self), reader, recv_tx, shutdown.clone());
        backend::spawn_write_loop(
            Arc::clone(self),
            writer,
            send_rx,
            shutdown.clone(),
            self.config.request_timeout,
            self.config.debug,
        );
        backend::spawn_dispatch_loop(Arc::clone(self), recv_rx, shutdown.clone(), self.config.debug);

        match self.perform_connect_handshake().await {
            Ok(()) => {
                self.state.lock().await.status = Status::Connected;
                tracing::info!(client_id = %self.client_id().await, "client connected");
                Ok(())
            }
            Err(err) => {
                shutdown.signal();
                Err(err)
            }
        }
    }

    async fn perform_connect_handshake(&self) -> Result<(), ClientError> {
        let creds = self.state.lock().await.credentials.clone();
        let mut body = self.send_connect_request(&creds).await?;

        if body.expires && body.expired {
            let refreshed = self.obtain_refreshed_credentials()?;
            self.state.lock().await.credentials = refreshed.clone();
            body = self.send_connect_request(&refreshed).await?;
            if body.expired {
                return Err(ClientError::ClientExpired);
            }
        }

        self.state.lock().await.client_id = body.client.clone();

        if body.expires {
            self.schedule_refresh(Duration::from_secs(body.ttl.max(0) as u64)).await;
        }

        Ok(())
    }

    async fn send_connect_request(&self, creds: &Credentials) -> Result<ConnectBody, ClientError> {
        let params = ConnectParams {
            user: &creds.user,
            timestamp: &creds.timestamp,
            info: &creds.info,
            token: &creds.token,
        };
        let resp = self.request("connect", params).await?;
        decode_body(&resp)
    }

    fn obtain_refreshed_credentials(&self) -> Result<Credentials, ClientError> {
        match &self.handlers.on_refresh {
            Some(cb) => cb(),
            None => Err(ClientError::MissingRefreshHandler),
        }
    }

    async fn schedule_refresh(self: &Arc<Self>, ttl: std::time::Duration) {
        let client = Arc::clone(self);
        let handle = tokio::spawn(async move { crate::refresh::run(client, ttl).await });

        let mut state = self.state.lock().await;
        if let Some(old) = state.refresh_task.take() {
            old.abort();
        }
        state.refresh_task = Some(handle);
    }

    pub(crate) async fn fire_refresh(self: &Arc<Self>) -> Result<(), ClientError> {
        let creds = self.obtain_refreshed_credentials()?;
        self.state.lock().await.credentials = creds.clone();

        let params = RefreshParams {
            user: &creds.user,
            timestamp: &creds.timestamp,
            info: &creds.info,
            token: &creds.token,
        };
        let resp = self.request("refresh", params).await?;
        let body: ConnectBody = decode_body(&resp)?;

        if body.expired {
            return Err(ClientError::ClientExpired);
        }
        if body.expires {
            self.schedule_refresh(std::time::Duration::from_secs(body.ttl.max(0) as u64)).await;
        }
        Ok(())
    }

    /// Subscribes to `channel`, installing `handlers` for messages/joins/leaves on it.
    #[tracing::instrument(skip(self, channel, handlers), err)]
    pub async fn subscribe(
        self: &Arc<Self>,
        channel: impl Into<String>,
        handlers: SubHandlers,
    ) -> Result<Arc<Sub>, ClientError> {
        let channel = channel.into();
        if self.subscriptions.contains(&channel).await {
            return Err(ClientError::AlreadySubscribed(channel));
        }

        let sign = if channel.starts_with(&self.config.private_channel_prefix) {
            Some(self.obtain_private_sign(&channel).await?)
        } else {
            None
        };

        let sub = Arc::new(Sub::new(channel.clone(), None, handlers));
        self.subscriptions.insert(sub.clone()).await?;

        match self.send_subscribe_request(&channel, None, sign.as_ref()).await {
            Ok(body) => {
                self.apply_subscribe_reply(&sub, body).await;
                tracing::info!(channel = %sub.channel, "subscribed");
                Ok(sub)
            }
            Err(err) => {
                self.subscriptions.remove(&channel).await;
                Err(err)
            }
        }
    }

    async fn obtain_private_sign(&self, channel: &str) -> Result<PrivateSign, ClientError> {
        let client_id = self.client_id().await;
        match &self.handlers.on_private_sub {
            Some(cb) => cb(&client_id, channel),
            None => Err(ClientError::MissingPrivateSignHandler(channel.to_string())),
        }
    }

    async fn send_subscribe_request(
        &self,
        channel: &str,
        last: Option<&str>,
        sign: Option<&PrivateSign>,
    ) -> Result<SubscribeBody, ClientError> {
        let client_id_owned;
        let (client_field, info_field, sign_field) = match sign {
            Some(s) => {
                client_id_owned = self.client_id().await;
                (Some(client_id_owned.as_str()), Some(s.info.as_str()), Some(s.sign.as_str()))
            }
            None => (None, None, None),
        };

        let params = SubscribeParams {
            channel,
            recover: last.map(|_| true),
            last,
            client: client_field,
            info: info_field,
            sign: sign_field,
        };
        let resp = self.request("subscribe", params).await?;
        let body: SubscribeBody = decode_body(&resp)?;
        if !body.status {
            return Err(ClientError::BadSubscribeStatus(channel.to_string()));
        }
        Ok(body)
    }

    /// Applies a subscribe (or resubscribe) reply's recovery payload: replays `messages` oldest
    /// first (the wire carries them newest first) and advances `last_message_id`.
    async fn apply_subscribe_reply(&self, sub: &Arc<Sub>, body: SubscribeBody) {
        if !body.messages.is_empty() {
            for raw in body.messages.iter().rev() {
                match serde_json::from_str::<MessageUid>(raw.get()) {
                    Ok(envelope) if !envelope.uid.is_empty() => {
                        sub.set_last_message_id(envelope.uid).await;
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(%err, "recovered message missing a uid"),
                }
                sub.dispatch_message(raw);
            }
        } else if let Some(last) = body.last {
            sub.set_last_message_id(last).await;
        }
    }

    /// Unsubscribes from `channel`. A channel with no active `Sub` returns `Ok(())` without
    /// sending anything.
    #[tracing::instrument(skip(self), err)]
    pub async fn unsubscribe(self: &Arc<Self>, channel: &str) -> Result<(), ClientError> {
        if !self.subscriptions.contains(channel).await {
            return Ok(());
        }

        let params = ChannelParams { channel };
        let resp = self.request("unsubscribe", params).await?;
        let body: StatusBody = decode_body(&resp)?;
        if !body.status {
            return Err(ClientError::BadUnsubscribeStatus(channel.to_string()));
        }

        if let Some(sub) = self.subscriptions.remove(channel).await {
            sub.dispatch_unsubscribe();
        }
        tracing::info!(channel, "unsubscribed");
        Ok(())
    }

    #[tracing::instrument(skip(self, data), err)]
    pub async fn publish(&self, channel: &str, data: &RawValue) -> Result<(), ClientError> {
        let params = PublishParams { channel, data };
        let resp = self.request("publish", params).await?;
        let body: StatusBody = decode_body(&resp)?;
        if !body.status {
            return Err(ClientError::BadPublishStatus(channel.to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn history(&self, channel: &str) -> Result<Vec<Box<RawValue>>, ClientError> {
        let params = ChannelParams { channel };
        let resp = self.request("history", params).await?;
        let body: HistoryBody = decode_body(&resp)?;
        Ok(body.data)
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn presence(&self, channel: &str) -> Result<HashMap<String, Box<RawValue>>, ClientError> {
        let params = ChannelParams { channel };
        let resp = self.request("presence", params).await?;
        let body: PresenceBody = decode_body(&resp)?;
        Ok(body.data)
    }

    /// Runs one synchronous command to completion: allocate a uid, register a waiter, enqueue the
    /// frame, then race the delivery slot against the request timeout and the shutdown signal.
    /// The waiter is removed from the registry on every exit path.
    async fn request(&self, method: &str, params: impl serde::Serialize) -> Result<Response, ClientError> {
        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst).to_string();
        let frame = Command::new(&uid, method, params).to_frame()?;

        let slot = self.waiters.register(uid.clone()).await?;

        let (send_tx, shutdown) = {
            let state = self.state.lock().await;
            match &state.send_tx {
                Some(tx) => (tx.clone(), state.shutdown.clone()),
                None => {
                    self.waiters.remove(&uid).await;
                    return Err(ClientError::ClientDisconnected);
                }
            }
        };

        if send_tx.send(frame).await.is_err() {
            self.waiters.remove(&uid).await;
            return Err(ClientError::ClientDisconnected);
        }

        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                self.waiters.remove(&uid).await;
                Err(ClientError::ClientDisconnected)
            }
            _ = tokio::time::sleep(self.config.request_timeout) => {
                self.waiters.remove(&uid).await;
                Err(ClientError::Timeout)
            }
            delivery = slot => {
                match delivery {
                    Ok(Delivery::Response(resp)) if resp.is_error() => {
                        Err(ClientError::Server(resp.error.clone()))
                    }
                    Ok(Delivery::Response(resp)) => Ok(resp),
                    Ok(Delivery::Cancelled) | Err(_) => Err(ClientError::WaiterClosed),
                }
            }
        }
    }

    /// Reconnects after a disconnect: dials fresh, repeats the connect handshake, then
    /// resubscribes every channel still in the registry. `max_attempts == 0` retries forever.
    #[tracing::instrument(skip(self), err)]
    pub async fn reconnect(self: &Arc<Self>, max_attempts: u32) -> Result<(), ClientError> {
        {
            let mut state = self.state.lock().await;
            if state.status.is_terminal() {
                return Err(ClientError::ClientStatus);
            }
            state.status = Status::Reconnecting;
        }
        tracing::info!("reconnecting");

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.do_reconnect_attempt().await {
                Ok(()) => {
                    self.state.lock().await.status = Status::Connected;
                    tracing::info!(attempt, "reconnect succeeded");
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(attempt, %err, "reconnect attempt failed");
                    if max_attempts != 0 && attempt >= max_attempts {
                        self.state.lock().await.status = Status::Disconnected;
                        return Err(ClientError::ReconnectFailed);
                    }
                    let delay = self.reconnect_strategy.delay_for_attempt(attempt);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn do_reconnect_attempt(self: &Arc<Self>) -> Result<(), ClientError> {
        let (reader, writer) = (self.dialer)(self.url.clone()).await?;
        self.bring_up(reader, writer).await?;
        match self.resubscribe_all().await {
            Ok(()) => Ok(()),
            Err(err) => {
                // bring_up already succeeded, so this generation's read/write/dispatch tasks are
                // live and holding the transport open; without this they'd never be told to stop.
                self.current_shutdown().await.signal();
                Err(err)
            }
        }
    }

    /// Resubscribes every channel currently in the registry, in registry traversal order. The
    /// first failure aborts the sweep; the registry is left untouched so the next reconnect
    /// attempt retries it.
    async fn resubscribe_all(self: &Arc<Self>) -> Result<(), ClientError> {
        for sub in self.subscriptions.snapshot().await {
            let last = sub.last_message_id().await;
            let body = self.send_subscribe_request(&sub.channel, last.as_deref(), None).await?;
            self.apply_subscribe_reply(&sub, body).await;
        }
        Ok(())
    }

    /// Called by the read/write loops (`backend.rs`) on transport failure or peer close. Cancels
    /// all waiters and transitions to `Disconnected`; does not itself reconnect.
    pub(crate) async fn handle_disconnect(self: &Arc<Self>, err: Option<ClientError>) {
        {
            let mut state = self.state.lock().await;
            if state.status.is_terminal() {
                return;
            }
            state.shutdown.signal();
            state.send_tx = None;
            state.status = Status::Disconnected;
            if let Some(handle) = state.refresh_task.take() {
                handle.abort();
            }
        }

        self.waiters.cancel_all().await;
        if let Some(err) = &err {
            self.handlers.notify_error(err);
        }
        self.handlers.notify_disconnect();
        tracing::info!("client disconnected");
    }

    /// Closes the client: best-effort unsubscribe of every active channel (if currently
    /// connected), then cancels waiters, signals shutdown, and transitions to the terminal
    /// `Closed` status. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn close(self: &Arc<Self>) {
        if self.status().await.is_terminal() {
            return;
        }

        if self.status().await == Status::Connected {
            for sub in self.subscriptions.snapshot().await {
                let _ = self.unsubscribe(&sub.channel).await;
            }
        }

        {
            let mut state = self.state.lock().await;
            state.shutdown.signal();
            state.send_tx = None;
            state.status = Status::Closed;
            if let Some(handle) = state.refresh_task.take() {
                handle.abort();
            }
        }

        self.waiters.cancel_all().await;
        tracing::info!("client closed");
    }

    pub async fn status(&self) -> Status {
        self.state.lock().await.status
    }

    pub async fn client_id(&self) -> String {
        self.state.lock().await.client_id.clone()
    }

    pub async fn credentials(&self) -> Credentials {
        self.state.lock().await.credentials.clone()
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub(crate) fn handlers(&self) -> &ClientHandlers {
        &self.handlers
    }

    pub(crate) async fn current_shutdown(&self) -> Arc<Shutdown> {
        self.state.lock().await.shutdown.clone()
    }

    /// Routes one decoded inbound response: synchronous replies (`uid` set) go to the waiter
    /// registry, everything else is an async broadcast routed by `dispatch.rs`.
    pub(crate) async fn route_response(self: &Arc<Self>, resp: Response) {
        if resp.is_sync() {
            self.waiters.deliver(resp).await;
        } else {
            dispatch::handle_async(self, resp).await;
        }
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(resp: &Response) -> Result<T, ClientError> {
    serde_json::from_str(resp.body_or_null().get()).map_err(|e| ClientError::Wire(WireError::Decode(e)))
}
