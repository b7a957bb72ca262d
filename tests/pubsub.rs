//! Integration tests against an in-process mock WebSocket server, scripted per scenario.
//!
//! Each test binds an ephemeral loopback port, accepts one connection with
//! `tokio_tungstenite::accept_async`, and scripts replies by hand so tests can run concurrently
//! without colliding on a fixed port.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message, WebSocketStream};

use duplex_pubsub::{
    Client, ClientError, ClientHandlers, Config, Credentials, Periodic, SubHandlers,
};

type ServerStream = WebSocketStream<TcpStream>;

async fn bind_mock_server() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    (format!("ws://{addr}"), listener)
}

/// Reads one request frame, asserts its method, and replies with `body` under the same uid.
async fn expect_and_reply(ws: &mut ServerStream, method: &str, body: serde_json::Value) {
    let msg = ws.next().await.expect("stream ended early").expect("ws read error");
    let text = msg.into_text().expect("expected a text frame");
    let req: serde_json::Value = serde_json::from_str(&text).expect("expected JSON");
    assert_eq!(req["method"], method, "unexpected method in request {text}");
    let uid = req["uid"].as_str().expect("request missing uid").to_string();
    let resp = json!({"uid": uid, "error": "", "method": method, "body": body});
    ws.send(Message::Text(resp.to_string())).await.expect("reply send failed");
}

fn default_strategy() -> Box<Periodic> {
    Box::new(Periodic::new(Duration::from_secs(1)))
}

#[tokio::test]
async fn connect_then_publish() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        expect_and_reply(&mut ws, "publish", json!({"status": true})).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "token"),
        Config::default(),
        ClientHandlers::default(),
        default_strategy(),
    )
    .await
    .expect("connect should succeed");

    assert_eq!(client.client_id().await, "c1");

    let data = serde_json::value::to_raw_value(&json!({"hello": "world"})).unwrap();
    client.publish("news", &data).await.expect("publish should succeed");

    server.await.unwrap();
}

#[tokio::test]
async fn expired_credentials_trigger_refresh_then_success() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "", "expires": true, "expired": true, "ttl": 0}),
        )
        .await;
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": true, "expired": false, "ttl": 3600}),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    let handlers = ClientHandlers::builder()
        .on_refresh(|| Ok(Credentials::new("alice", "1700000001", "", "fresh-token")))
        .build();

    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "stale-token"),
        Config::default(),
        handlers,
        default_strategy(),
    )
    .await
    .expect("connect should recover from one expired round-trip");

    assert_eq!(client.client_id().await, "c1");
    server.await.unwrap();
}

#[tokio::test]
async fn scheduled_refresh_fires_and_sends_a_refresh_command() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": true, "expired": false, "ttl": 1}),
        )
        .await;
        // The refresh timer should fire ~1s after connect and issue a `refresh` command without
        // any caller driving it.
        expect_and_reply(
            &mut ws,
            "refresh",
            json!({"client": "c1", "expires": true, "expired": false, "ttl": 1}),
        )
        .await;
        // A second refresh confirms the timer reschedules itself rather than firing once.
        expect_and_reply(
            &mut ws,
            "refresh",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    let refresh_calls = Arc::new(Mutex::new(0usize));
    let refresh_calls2 = refresh_calls.clone();
    let handlers = ClientHandlers::builder()
        .on_refresh(move || {
            *refresh_calls2.lock().unwrap() += 1;
            Ok(Credentials::new("alice", "1700000000", "", "token"))
        })
        .build();

    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "token"),
        Config::default(),
        handlers,
        default_strategy(),
    )
    .await
    .expect("connect should succeed");

    assert_eq!(client.client_id().await, "c1");

    tokio::time::timeout(Duration::from_secs(3), server).await.expect("refresh loop timed out").unwrap();

    assert_eq!(*refresh_calls.lock().unwrap(), 2, "expected the refresh timer to fire twice");
}

#[tokio::test]
async fn batched_inbound_dispatched_in_order() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        expect_and_reply(
            &mut ws,
            "subscribe",
            json!({"status": true, "last": null, "messages": [], "recovered": false}),
        )
        .await;
        expect_and_reply(
            &mut ws,
            "subscribe",
            json!({"status": true, "last": null, "messages": [], "recovered": false}),
        )
        .await;

        let batch = json!([
            {"uid": "", "error": "", "method": "message", "body": {"channel": "a", "uid": "m1"}},
            {"uid": "", "error": "", "method": "message", "body": {"channel": "b", "uid": "m2"}},
        ]);
        ws.send(Message::Text(batch.to_string())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
    });

    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "token"),
        Config::default(),
        ClientHandlers::default(),
        default_strategy(),
    )
    .await
    .unwrap();

    let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let order_a = order.clone();
    let handlers_a = SubHandlers::builder()
        .on_message(move |_sub, body| order_a.lock().unwrap().push(format!("a:{}", body.get())))
        .build();
    let order_b = order.clone();
    let handlers_b = SubHandlers::builder()
        .on_message(move |_sub, body| order_b.lock().unwrap().push(format!("b:{}", body.get())))
        .build();

    client.subscribe("a", handlers_a).await.unwrap();
    client.subscribe("b", handlers_b).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let got = order.lock().unwrap().clone();
    assert_eq!(got.len(), 2, "expected both messages dispatched: {got:?}");
    assert!(got[0].starts_with("a:"), "batch order violated: {got:?}");
    assert!(got[1].starts_with("b:"), "batch order violated: {got:?}");

    server.await.unwrap();
}

#[tokio::test]
async fn resubscribe_recovers_missed_messages_oldest_first() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        // First connection: initial connect + subscribe (no recovery yet).
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        expect_and_reply(
            &mut ws,
            "subscribe",
            json!({"status": true, "last": "m0", "messages": [], "recovered": false}),
        )
        .await;
        // Drop the connection: the client's read loop observes this as a peer close and runs
        // its disconnect handler before the test drives an explicit reconnect.
        ws.close().await.unwrap();

        // Second connection: reconnect's handshake + resubscribe, with recovery.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws2 = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws2,
            "connect",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        // Server returns newest-first; the client must replay oldest ("m1") before "m2".
        expect_and_reply(
            &mut ws2,
            "subscribe",
            json!({
                "status": true,
                "last": null,
                "messages": [
                    {"channel": "news", "uid": "m2"},
                    {"channel": "news", "uid": "m1"},
                ],
                "recovered": true,
            }),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "token"),
        Config::default(),
        ClientHandlers::default(),
        default_strategy(),
    )
    .await
    .unwrap();

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let handlers = SubHandlers::builder()
        .on_message(move |_sub, body| {
            let v: serde_json::Value = serde_json::from_str(body.get()).unwrap();
            seen2.lock().unwrap().push(v["uid"].as_str().unwrap().to_string());
        })
        .build();

    let sub = client.subscribe("news", handlers).await.unwrap();
    assert_eq!(sub.last_message_id().await, Some("m0".to_string()));

    // Wait for the read loop to observe the peer close and run handleDisconnect.
    for _ in 0..50 {
        if client.status().await == duplex_pubsub::Status::Disconnected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(client.status().await, duplex_pubsub::Status::Disconnected);

    client.reconnect(0).await.expect("reconnect should succeed");

    assert_eq!(seen.lock().unwrap().clone(), vec!["m1".to_string(), "m2".to_string()]);
    assert_eq!(sub.last_message_id().await, Some("m2".to_string()));

    server.await.unwrap();
}

#[tokio::test]
async fn timeout_on_unresponsive_server() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        // Read the publish request but never reply to it.
        let _ = ws.next().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let config = Config::builder().request_timeout(Duration::from_millis(80)).build().unwrap();
    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "token"),
        config,
        ClientHandlers::default(),
        default_strategy(),
    )
    .await
    .unwrap();

    let data = serde_json::value::to_raw_value(&json!({"x": 1})).unwrap();
    let started = tokio::time::Instant::now();
    let result = client.publish("news", &data).await;
    assert!(matches!(result, Err(ClientError::Timeout)), "expected Timeout, got {result:?}");
    assert!(started.elapsed() >= Duration::from_millis(80));

    server.await.unwrap();
}

#[tokio::test]
async fn close_cancels_in_flight_commands() {
    let (url, listener) = bind_mock_server().await;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_and_reply(
            &mut ws,
            "connect",
            json!({"client": "c1", "expires": false, "expired": false, "ttl": 0}),
        )
        .await;
        // Read the publish request but never reply: close() must cancel it regardless.
        let _ = ws.next().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let client = Client::connect(
        url,
        Credentials::new("alice", "1700000000", "", "token"),
        Config::default(),
        ClientHandlers::default(),
        default_strategy(),
    )
    .await
    .unwrap();

    let client2 = client.clone();
    let data = serde_json::value::to_raw_value(&json!({"x": 1})).unwrap();
    let publish_task = tokio::spawn(async move { client2.publish("news", &data).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close().await;

    let result = publish_task.await.unwrap();
    assert!(
        matches!(result, Err(ClientError::ClientDisconnected) | Err(ClientError::WaiterClosed)),
        "expected the in-flight publish to be cancelled by close(), got {result:?}"
    );

    server.await.unwrap();
}
