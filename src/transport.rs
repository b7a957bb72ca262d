//! Transport adapter: dial a URL, then split into an independent reader/writer pair so the read
//! loop and write loop can each suspend on their own I/O without blocking the other.
//!
//! The command layer and backend tasks are written against the [`Transport`] trait, not
//! [`WsTransport`] directly, so tests can substitute an in-process fake.

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};

/// Errors raised while dialing, reading, or writing over the transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),

    #[error("server did not acknowledge the protocol upgrade (status {0})")]
    NoUpgradeAck(http::StatusCode),

    #[error("transport received a binary frame, which this protocol never sends")]
    UnexpectedBinary(Vec<u8>),

    #[error("transport was closed by the peer")]
    PeerClosed,
}

/// The read half of a dialed [`Transport`].
#[async_trait]
pub trait TransportReader: Send {
    /// Reads one text frame. Returns `Ok(None)` on a clean peer-initiated close.
    async fn read_frame(&mut self) -> Result<Option<String>, TransportError>;
}

/// The write half of a dialed [`Transport`].
#[async_trait]
pub trait TransportWriter: Send {
    /// Writes one text frame.
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError>;

    /// Closes the connection. Best-effort; errors are not actionable at this point.
    async fn close(&mut self);
}

/// A full-duplex text-frame connection, dialed once and then split for concurrent read/write
/// loops (`backend.rs`).
#[async_trait]
pub trait Transport: Sized + Send {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    /// Dials `url`, requiring a protocol-upgrade acknowledgment from the server.
    async fn connect(url: &str) -> Result<Self, TransportError>;

    /// Splits the connection into independent reader/writer halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Production [`Transport`] over a live `tokio-tungstenite` WebSocket.
pub struct WsTransport {
    stream: WsStream,
}

/// Read half of a split [`WsTransport`].
pub struct WsReader(SplitStream<WsStream>);

/// Write half of a split [`WsTransport`].
pub struct WsWriter(SplitSink<WsStream, Message>);

#[async_trait]
impl Transport for WsTransport {
    type Reader = WsReader;
    type Writer = WsWriter;

    async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, response) = connect_async(url).await?;
        if response.status() != http::StatusCode::SWITCHING_PROTOCOLS {
            return Err(TransportError::NoUpgradeAck(response.status()));
        }
        tracing::debug!(url, "transport dialed and upgraded");
        Ok(Self { stream })
    }

    fn split(self) -> (WsReader, WsWriter) {
        let (writer, reader) = self.stream.split();
        (WsReader(reader), WsWriter(writer))
    }
}

#[async_trait]
impl TransportReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Binary(buf))) => return Err(TransportError::UnexpectedBinary(buf)),
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        tracing::debug!(code = %frame.code, reason = %frame.reason, "peer sent close frame");
                    }
                    return Err(TransportError::PeerClosed);
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl TransportWriter for WsWriter {
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.0.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

/// A dialed, split, type-erased transport: what a [`Dialer`] produces.
pub type DialedTransport = (Box<dyn TransportReader>, Box<dyn TransportWriter>);

/// Future returned by a [`Dialer`].
pub type DialFuture = futures_util::future::BoxFuture<'static, Result<DialedTransport, TransportError>>;

/// Dials and splits a transport, erasing its concrete type.
///
/// The command layer (`client.rs`) holds one `Dialer` for the lifetime of a `Client`, used both
/// for the initial connect and every reconnect attempt, so a test can substitute a fake transport
/// once at construction without the rest of the client ever becoming generic over it.
pub type Dialer = Box<dyn Fn(String) -> DialFuture + Send + Sync>;

/// Builds a [`Dialer`] for any concrete [`Transport`] implementation.
pub fn dialer_for<T: Transport + 'static>() -> Dialer {
    Box::new(|url: String| {
        Box::pin(async move {
            let transport = T::connect(&url).await?;
            let (reader, writer) = transport.split();
            Ok((Box::new(reader) as Box<dyn TransportReader>, Box::new(writer) as Box<dyn TransportWriter>))
        })
    })
}

/// The production dialer, over a live `tokio-tungstenite` connection.
pub fn ws_dialer() -> Dialer {
    dialer_for::<WsTransport>()
}
