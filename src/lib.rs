//! An async client for a JSON-framed publish/subscribe protocol over a persistent full-duplex
//! text transport (a WebSocket).
//!
//! The client authenticates with [`Credentials`], subscribes to named channels, receives
//! asynchronous message/join/leave events, and issues synchronous request/response commands
//! (subscribe, unsubscribe, publish, history, presence, refresh) multiplexed over one connection
//! by a per-command correlation id. It recovers missed messages on resubscribe and reconnects
//! with a pluggable backoff strategy.
//!
//! Module layout mirrors the crate's component design: [`transport`] dials and frames bytes,
//! [`codec`] encodes/decodes the wire format, [`waiter`] and [`subscription`] hold the two
//! independently-locked registries the command layer (`client`) coordinates, [`backend`] and
//! [`dispatch`] run the read/write/dispatch tasks, and [`refresh`]/[`reconnect`] implement the
//! credential-refresh timer and reconnect strategies.

mod backend;
pub mod client;
pub mod codec;
pub mod config;
pub mod credentials;
mod dispatch;
pub mod error;
pub mod handlers;
mod refresh;
pub mod reconnect;
pub mod shapes;
mod shutdown;
pub mod status;
pub mod subscription;
pub mod transport;
mod waiter;

pub use client::Client;
pub use codec::{Command, Response, WireError};
pub use config::{Config, ConfigBuilder};
pub use credentials::Credentials;
pub use error::ClientError;
pub use handlers::{ClientHandlers, ClientHandlersBuilder, PrivateSign, SubHandlers, SubHandlersBuilder};
pub use reconnect::{ExponentialBackoff, Periodic, ReconnectStrategy};
pub use status::Status;
pub use subscription::{Sub, SubscriptionRegistry};
pub use transport::{Transport, TransportError, TransportReader, TransportWriter, WsTransport};
pub use waiter::WaiterRegistry;
