//! Read loop / write loop / dispatch loop: three cooperating tasks bridging the transport to the
//! bounded send/receive queues. Each is spawned as its own task (rather than multiplexed into one
//! `select!` loop) so the read and write sides can suspend and fail independently of one another.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    client::Client,
    codec,
    shutdown::Shutdown,
    transport::{TransportReader, TransportWriter},
    ClientError,
};

pub(crate) fn spawn_read_loop(
    client: Arc<Client>,
    mut reader: Box<dyn TransportReader>,
    recv_tx: mpsc::Sender<String>,
    shutdown: Arc<Shutdown>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::trace!("read loop observed shutdown");
                    return;
                }
                frame = reader.read_frame() => {
                    match frame {
                        Ok(Some(text)) => {
                            if recv_tx.send(text).await.is_err() {
                                // Dispatch loop is gone; nothing left to do.
                                return;
                            }
                        }
                        Ok(None) => {
                            client.handle_disconnect(None).await;
                            return;
                        }
                        Err(err) => {
                            tracing::error!(%err, "read loop transport error");
                            client.handle_disconnect(Some(err.into())).await;
                            return;
                        }
                    }
                }
            }
        }
    });
}

pub(crate) fn spawn_write_loop(
    client: Arc<Client>,
    mut writer: Box<dyn TransportWriter>,
    mut send_rx: mpsc::Receiver<String>,
    shutdown: Arc<Shutdown>,
    request_timeout: Duration,
    debug: bool,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    writer.close().await;
                    return;
                }
                item = send_rx.recv() => {
                    match item {
                        Some(frame) => {
                            if debug {
                                tracing::debug!(frame = %frame, "writing outbound frame");
                            }
                            match tokio::time::timeout(request_timeout, writer.write_frame(frame)).await {
                                Ok(Ok(())) => {}
                                Ok(Err(err)) => {
                                    tracing::error!(%err, "write loop transport error");
                                    client.handle_disconnect(Some(err.into())).await;
                                    return;
                                }
                                Err(_elapsed) => {
                                    tracing::error!("write deadline exceeded");
                                    client.handle_disconnect(Some(ClientError::Timeout)).await;
                                    return;
                                }
                            }
                        }
                        None => {
                            // All senders dropped: client is tearing down.
                            writer.close().await;
                            return;
                        }
                    }
                }
            }
        }
    });
}

pub(crate) fn spawn_dispatch_loop(
    client: Arc<Client>,
    mut recv_rx: mpsc::Receiver<String>,
    shutdown: Arc<Shutdown>,
    debug: bool,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    tracing::trace!("dispatch loop observed shutdown");
                    return;
                }
                item = recv_rx.recv() => {
                    match item {
                        Some(frame) => {
                            if debug {
                                tracing::debug!(frame = %frame, "received inbound frame");
                            }
                            match codec::decode_frame(&frame) {
                                Ok(responses) => {
                                    for response in responses {
                                        client.route_response(response).await;
                                    }
                                }
                                Err(err) => {
                                    tracing::error!(%err, "failed to decode inbound frame");
                                    client.handlers().notify_error(&ClientError::Wire(err));
                                }
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    });
}
