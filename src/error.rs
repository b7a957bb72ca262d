use crate::codec::WireError;

/// Errors surfaced by the client to its caller.
///
/// This is the single error type for every fallible operation in the crate, rather than scattering
/// ad hoc string errors across call sites.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No reply arrived for a synchronous command within `Config::request_timeout`.
    #[error("command timed out waiting for a reply")]
    Timeout,

    /// `register` was called twice for the same correlation uid.
    #[error("a waiter is already registered for this uid")]
    DuplicateWaiter,

    /// The waiter's delivery slot was closed (by `cancel_all`) before a reply arrived.
    #[error("waiter was cancelled before a reply arrived")]
    WaiterClosed,

    /// The operation is not valid in the client's current `Status`.
    #[error("operation not valid in current client status")]
    ClientStatus,

    /// The client is disconnected (shutdown signalled) and cannot serve the request.
    #[error("client is disconnected")]
    ClientDisconnected,

    /// Credentials remained expired after a refresh attempt.
    #[error("credentials expired")]
    ClientExpired,

    /// A reconnect strategy exhausted its attempt budget.
    #[error("reconnect attempts exhausted")]
    ReconnectFailed,

    /// Server rejected a subscribe command (`status == false`).
    #[error("server rejected subscribe request for channel {0:?}")]
    BadSubscribeStatus(String),

    /// Server rejected an unsubscribe command (`status == false`).
    #[error("server rejected unsubscribe request for channel {0:?}")]
    BadUnsubscribeStatus(String),

    /// Server rejected a publish command (`status == false`).
    #[error("server rejected publish request for channel {0:?}")]
    BadPublishStatus(String),

    /// `subscribe` was called for a channel that already has a `Sub` record.
    #[error("channel {0:?} is already subscribed")]
    AlreadySubscribed(String),

    /// Credentials expired and no `OnRefresh` handler was configured.
    #[error("credentials expired but no refresh handler is configured")]
    MissingRefreshHandler,

    /// A private channel was subscribed but no `OnPrivateSub` handler was configured, or the
    /// handler returned an error.
    #[error("private channel {0:?} requires a signing handler")]
    MissingPrivateSignHandler(String),

    /// A server-initiated error was carried on a synchronous reply.
    #[error("server error: {0}")]
    Server(String),

    /// The wire codec could not interpret an inbound or outbound frame.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The underlying transport failed to dial, read, or write.
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    /// `Config::builder().build()` was given an invalid value.
    #[error("invalid configuration: {0}")]
    Config(String),
}
