//! Async message routing: turns an un-correlated `message`/`join`/`leave` frame into a call
//! against the matching subscription's handlers.

use crate::{client::Client, codec::Response, error::ClientError, shapes::AsyncEnvelope};

/// Routes one decoded async `Response` (anything that is not a reply to a waiting command) to
/// its subscription's handlers. Unknown channels and unknown methods are logged and dropped:
/// the server may have raced an unsubscribe with an in-flight message.
pub(crate) async fn handle_async(client: &Client, resp: Response) {
    if resp.is_error() {
        tracing::error!(method = %resp.method, error = %resp.error, "server reported an error on an async response");
        client.handlers().notify_error(&ClientError::Server(resp.error.clone()));
        return;
    }

    let Some(body) = resp.body.as_deref() else {
        tracing::warn!(method = %resp.method, "async message carried no body");
        return;
    };

    let envelope: AsyncEnvelope = match serde_json::from_str(body.get()) {
        Ok(e) => e,
        Err(err) => {
            tracing::warn!(%err, method = %resp.method, "malformed async envelope");
            return;
        }
    };

    let Some(sub) = client.subscriptions().get(&envelope.channel).await else {
        tracing::debug!(channel = %envelope.channel, method = %resp.method, "async message for unknown channel");
        return;
    };

    match resp.method.as_str() {
        "message" => {
            if !envelope.uid.is_empty() {
                sub.set_last_message_id(envelope.uid).await;
            }
            sub.dispatch_message(body);
        }
        "join" => sub.dispatch_join(body),
        "leave" => sub.dispatch_leave(body),
        other => {
            tracing::warn!(method = %other, "unrecognized async method");
        }
    }
}
