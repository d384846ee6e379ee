//! Client Tests: full request/connection lifecycle over the in-memory transport
//!
//! These tests verify:
//! 1. Auth handshake (challenge flow, signature check, rejection)
//! 2. Request correlation, timeouts and bulk failure on connection loss
//! 3. Reconnect policy and the exact status sequence on exhaustion
//! 4. Channel subscription survives reconnects
//! 5. close() cancels everything and nothing resurrects afterwards

use async_trait::async_trait;
use beelink::{
    verify, ClientConfig, ClientError, ClientResult, ConnectionStatus, KeyManager, LocalSigner, MemoryServer,
    RealtimeClient, ServerConnection, ServerMessage, Signature, SignedEnvelope, Signer, Subscription,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn keys() -> KeyManager {
    let keys = KeyManager::new();
    keys.generate_keypair().expect("generate");
    keys
}

fn plain_config() -> ClientConfig {
    ClientConfig::new("mem://test").with_authentication(false)
}

fn build(server: &MemoryServer, config: ClientConfig, keys: KeyManager) -> RealtimeClient {
    RealtimeClient::builder(config)
        .transport(server.transport())
        .key_manager(keys)
        .build()
        .expect("build")
}

type Log<T> = Arc<Mutex<Vec<T>>>;

fn record_status(client: &RealtimeClient) -> (Log<ConnectionStatus>, Subscription) {
    let log: Log<ConnectionStatus> = Arc::default();
    let sink = log.clone();
    let sub = client.on_status_change(move |s| sink.lock().unwrap().push(*s));
    (log, sub)
}

fn record_errors(client: &RealtimeClient) -> (Log<ClientError>, Subscription) {
    let log: Log<ClientError> = Arc::default();
    let sink = log.clone();
    let sub = client.on_error(move |e| sink.lock().unwrap().push(e.clone()));
    (log, sub)
}

fn answer(frame: &Value) -> Value {
    match frame["method"].as_str() {
        Some("auth_request") => json!({ "challenge": "challenge-1" }),
        Some("auth_verify") => json!({ "success": true }),
        _ => json!({ "ok": true }),
    }
}

/// Answers every request on every connection; `kick` drops the current one.
struct Responder {
    seen: Log<Value>,
    kick: mpsc::UnboundedSender<()>,
}

fn spawn_responder(server: Arc<MemoryServer>) -> Responder {
    let seen: Log<Value> = Arc::default();
    let (kick, mut kick_rx) = mpsc::unbounded_channel::<()>();
    let log = seen.clone();
    tokio::spawn(async move {
        while let Some(mut conn) = server.accept().await {
            let kicked = loop {
                tokio::select! {
                    frame = conn.recv_json() => match frame {
                        Some(frame) => {
                            log.lock().unwrap().push(frame.clone());
                            let id = frame["id"].as_u64().expect("id");
                            conn.respond(id, answer(&frame)).await;
                        }
                        None => break false,
                    },
                    _ = kick_rx.recv() => break true,
                }
            };
            if kicked {
                conn.close(Some("kicked")).await;
            }
        }
    });
    Responder { seen, kick }
}

fn methods(seen: &Log<Value>) -> Vec<String> {
    seen.lock().unwrap().iter().map(|f| f["method"].as_str().unwrap_or_default().to_string()).collect()
}

async fn next_request(conn: &mut ServerConnection) -> (u64, Value) {
    let frame = conn.recv_json().await.expect("frame");
    (frame["id"].as_u64().expect("id"), frame)
}

async fn wait_until_status(client: &RealtimeClient, target: ConnectionStatus) {
    let mut rx = client.watch_status();
    while *rx.borrow_and_update() != target {
        rx.changed().await.expect("status channel");
    }
}

/// Test: auth_request is signed by the client key, challenge is echoed back
#[tokio::test]
async fn auth_handshake_with_challenge() {
    let server = MemoryServer::new();
    let keys = keys();
    let keypair = keys.keypair().expect("keypair");
    let client = build(&server, ClientConfig::new("mem://test"), keys);
    let (statuses, _s) = record_status(&client);

    let public_key = keypair.public_key_hex();
    let address = keypair.address().to_string();
    let server_task = tokio::spawn(async move {
        let mut conn = server.accept().await.expect("accept");

        let (id, frame) = next_request(&mut conn).await;
        assert_eq!(frame["method"], "auth_request");
        assert_eq!(frame["params"]["address"], address.as_str());
        assert_eq!(frame["params"]["public_key"], public_key.as_str());
        assert_eq!(frame["signer"], address.as_str());
        let payload = SignedEnvelope::signing_payload(
            id,
            "auth_request",
            &frame["params"],
            frame["timestamp"].as_i64().expect("timestamp"),
        );
        let signature = Signature::from_hex(frame["signature"].as_str().expect("sig")).expect("hex");
        assert!(verify(&public_key, &payload, &signature));
        conn.respond(id, json!({ "challenge": "abc" })).await;

        let (id, frame) = next_request(&mut conn).await;
        assert_eq!(frame["method"], "auth_verify");
        assert_eq!(frame["params"]["challenge"], "abc");
        conn.respond(id, json!({ "success": true })).await;
        conn
    });

    assert_eq!(client.connect().await, Ok(true));
    let _conn = server_task.await.expect("server");
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Authenticating, ConnectionStatus::Connected]
    );
    assert_eq!(client.address().as_deref(), Some(keypair.address()));
}

/// Test: a rejected auth_request ends in auth_failed and never reconnects
#[tokio::test(start_paused = true)]
async fn auth_rejection_is_terminal() {
    let server = Arc::new(MemoryServer::new());
    let client = build(&server, ClientConfig::new("mem://test"), keys());
    let (statuses, _s) = record_status(&client);
    let (errors, _e) = record_errors(&client);

    let srv = server.clone();
    tokio::spawn(async move {
        let mut conn = srv.accept().await.expect("accept");
        let (id, _) = next_request(&mut conn).await;
        conn.respond_error(id, "bad signature").await;
        let _ = conn.recv().await;
    });

    assert_eq!(client.connect().await, Ok(false));
    assert_eq!(client.status(), ConnectionStatus::AuthFailed);
    assert_eq!(statuses.lock().unwrap().last(), Some(&ConnectionStatus::AuthFailed));
    assert!(errors.lock().unwrap().contains(&ClientError::AuthFailed("bad signature".into())));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(server.open_count(), 1);
    assert_eq!(client.status(), ConnectionStatus::AuthFailed);
}

/// Test: responses are matched by id, not by arrival order
#[tokio::test]
async fn out_of_order_responses_reach_their_callers() {
    let server = MemoryServer::new();
    let client = build(&server, plain_config(), keys());
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    let mut calls = Vec::new();
    for method in ["alpha", "beta", "gamma"] {
        let c = client.clone();
        calls.push(tokio::spawn(async move { c.send_request(method, json!({ "m": method })).await }));
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(next_request(&mut conn).await);
    }
    for (id, frame) in received.iter().rev() {
        conn.respond(*id, json!({ "echo": frame["params"]["m"] })).await;
    }

    for (call, method) in calls.into_iter().zip(["alpha", "beta", "gamma"]) {
        let result = call.await.expect("join").expect("response");
        assert_eq!(result, json!({ "echo": method }));
    }
    assert_eq!(client.pending_requests(), 0);
}

/// Test: two pings in flight carry distinct ids and both resolve
#[tokio::test]
async fn concurrent_pings_use_distinct_ids() {
    let server = Arc::new(MemoryServer::new());
    let responder = spawn_responder(server.clone());
    let client = build(&server, plain_config(), keys());
    assert_eq!(client.connect().await, Ok(true));

    let (a, b) = tokio::join!(client.ping(), client.ping());
    assert_eq!(a, Ok(()));
    assert_eq!(b, Ok(()));

    let ids: Vec<u64> = responder.seen.lock().unwrap().iter().map(|f| f["id"].as_u64().unwrap()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

/// Test: socket loss rejects every pending request and empties the registry
#[tokio::test]
async fn connection_loss_rejects_all_pending() {
    let server = MemoryServer::new();
    let client = build(&server, plain_config().with_auto_reconnect(false), keys());
    let (errors, _e) = record_errors(&client);
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    let calls: Vec<_> = (0..3)
        .map(|i| {
            let c = client.clone();
            tokio::spawn(async move { c.send_request("slow", json!({ "n": i })).await })
        })
        .collect();
    for _ in 0..3 {
        next_request(&mut conn).await;
    }
    assert_eq!(client.pending_requests(), 3);

    conn.close(Some("maintenance")).await;
    for call in calls {
        assert_eq!(call.await.expect("join"), Err(ClientError::ConnectionLost));
    }
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(errors.lock().unwrap().contains(&ClientError::ConnectionLost));
}

/// Test: timeout rejects with method and id; the late answer is ignored
#[tokio::test(start_paused = true)]
async fn request_timeout_then_late_response() {
    let server = MemoryServer::new();
    let config = plain_config().with_request_timeout(Duration::from_millis(500));
    let client = build(&server, config, keys());
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    let c = client.clone();
    let call = tokio::spawn(async move { c.send_request("slow", json!({})).await });
    let (id, _) = next_request(&mut conn).await;

    assert_eq!(
        call.await.expect("join"),
        Err(ClientError::RequestTimeout { id, method: "slow".into() })
    );
    assert_eq!(client.pending_requests(), 0);

    // Late answer: dropped, client keeps working
    conn.respond(id, json!("too late")).await;
    let c = client.clone();
    let ping = tokio::spawn(async move { c.ping().await });
    let (ping_id, frame) = next_request(&mut conn).await;
    assert_eq!(frame["method"], "ping");
    assert_ne!(ping_id, id);
    conn.respond(ping_id, json!("pong")).await;
    assert_eq!(ping.await.expect("join"), Ok(()));
    assert_eq!(client.status(), ConnectionStatus::Connected);
}

/// Test: every attempt fails → exact status sequence, one reconnect_failed, no more dials
#[tokio::test(start_paused = true)]
async fn reconnect_exhaustion_status_sequence() {
    let server = MemoryServer::new();
    server.set_refuse(true);
    let config = plain_config()
        .with_max_reconnect_attempts(3)
        .with_reconnect_delay(Duration::from_millis(100));
    let client = build(&server, config, keys());
    let (statuses, _s) = record_status(&client);
    let (errors, _e) = record_errors(&client);

    assert_eq!(client.connect().await, Ok(false));

    use ConnectionStatus::*;
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![Connecting, Reconnecting, Connecting, Reconnecting, Connecting, Reconnecting, ReconnectFailed]
    );
    assert_eq!(server.open_count(), 3);
    let exhausted = errors
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, ClientError::ReconnectExhausted { attempts: 3 }))
        .count();
    assert_eq!(exhausted, 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(server.open_count(), 3);
    let failed = statuses.lock().unwrap().iter().filter(|s| **s == ReconnectFailed).count();
    assert_eq!(failed, 1);
}

/// Test: a new connect() after reconnect_failed starts a fresh cycle
#[tokio::test(start_paused = true)]
async fn connect_recovers_after_reconnect_failed() {
    let server = Arc::new(MemoryServer::new());
    server.set_refuse(true);
    let config = plain_config()
        .with_max_reconnect_attempts(1)
        .with_reconnect_delay(Duration::from_millis(10));
    let client = build(&server, config, keys());
    assert_eq!(client.connect().await, Ok(false));
    assert_eq!(client.status(), ConnectionStatus::ReconnectFailed);

    server.set_refuse(false);
    let _responder = spawn_responder(server.clone());
    assert_eq!(client.connect().await, Ok(true));
    assert_eq!(client.ping().await, Ok(()));
}

/// Test: the subscribed channel is restored after the socket drops
#[tokio::test(start_paused = true)]
async fn resubscribes_after_reconnect() {
    let server = Arc::new(MemoryServer::new());
    let responder = spawn_responder(server.clone());
    let config = ClientConfig::new("mem://test").with_reconnect_delay(Duration::from_millis(100));
    let client = build(&server, config, keys());
    let (errors, _e) = record_errors(&client);

    assert_eq!(client.connect().await, Ok(true));
    client.subscribe("public").await.expect("subscribe");
    assert_eq!(client.current_channel().as_deref(), Some("public"));

    let mut rx = client.watch_status();
    rx.borrow_and_update();
    responder.kick.send(()).expect("kick");
    rx.changed().await.expect("status");
    assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Reconnecting);
    wait_until_status(&client, ConnectionStatus::Connected).await;

    assert_eq!(
        methods(&responder.seen),
        vec!["auth_request", "auth_verify", "subscribe", "auth_request", "auth_verify", "subscribe"]
    );
    let last = responder.seen.lock().unwrap().last().cloned().expect("frame");
    assert_eq!(last["params"]["channel"], "public");
    assert_eq!(client.current_channel().as_deref(), Some("public"));
    assert_eq!(server.open_count(), 2);
    assert!(errors.lock().unwrap().contains(&ClientError::ConnectionLost));
}

/// Test: publish defaults to the current channel
#[tokio::test]
async fn publish_uses_current_channel() {
    let server = Arc::new(MemoryServer::new());
    let responder = spawn_responder(server.clone());
    let client = build(&server, plain_config(), keys());
    assert_eq!(client.connect().await, Ok(true));

    assert_eq!(client.publish_message("hi", None).await, Err(ClientError::NoChannel));
    client.subscribe("public").await.expect("subscribe");
    client.publish_message("hello", None).await.expect("publish");
    client.publish_message("direct", Some("ops")).await.expect("publish");

    let seen = responder.seen.lock().unwrap().clone();
    let published: Vec<(Value, Value)> = seen
        .iter()
        .filter(|f| f["method"] == "message")
        .map(|f| (f["params"]["channel"].clone(), f["params"]["message"].clone()))
        .collect();
    assert_eq!(
        published,
        vec![(json!("public"), json!("hello")), (json!("ops"), json!("direct"))]
    );

    client.unsubscribe().await.expect("unsubscribe");
    assert_eq!(client.current_channel(), None);
    assert_eq!(methods(&responder.seen).last().map(String::as_str), Some("unsubscribe"));
}

/// Test: a rejected subscribe leaves the current channel untouched
#[tokio::test]
async fn rejected_subscribe_keeps_channel() {
    let server = MemoryServer::new();
    let client = build(&server, plain_config(), keys());
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    let c = client.clone();
    let call = tokio::spawn(async move { c.subscribe("private").await });
    let (id, _) = next_request(&mut conn).await;
    conn.respond_error(id, "forbidden").await;

    assert_eq!(
        call.await.expect("join"),
        Err(ClientError::Remote { code: None, message: "forbidden".into() })
    );
    assert_eq!(client.current_channel(), None);
}

/// Test: pushes reach on_message; malformed frames surface as errors only
#[tokio::test]
async fn pushes_and_malformed_frames() {
    let server = MemoryServer::new();
    let client = build(&server, plain_config(), keys());
    let (errors, _e) = record_errors(&client);
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let _m = client.on_message(move |m| {
        let _ = tx.send(m.clone());
    });
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    conn.send("definitely not json").await;
    conn.push("message", Some("public"), json!({ "text": "hi" })).await;

    let message = rx.recv().await.expect("push");
    assert_eq!(message.kind, "message");
    assert_eq!(message.channel.as_deref(), Some("public"));
    assert_eq!(message.payload, json!({ "text": "hi" }));
    assert!(matches!(errors.lock().unwrap().first(), Some(ClientError::Protocol(_))));

    // Still usable
    let c = client.clone();
    let ping = tokio::spawn(async move { c.ping().await });
    let (id, _) = next_request(&mut conn).await;
    conn.respond(id, json!(null)).await;
    assert_eq!(ping.await.expect("join"), Ok(()));
}

/// Test: without a stored key the client waits for key generation first
#[tokio::test]
async fn generates_key_while_waiting() {
    let server = Arc::new(MemoryServer::new());
    let responder = spawn_responder(server.clone());
    let keys = KeyManager::new();
    let client = build(&server, ClientConfig::new("mem://test"), keys.clone());
    let (statuses, _s) = record_status(&client);

    assert_eq!(client.connect().await, Ok(true));
    assert!(keys.has_key());
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![
            ConnectionStatus::Waiting,
            ConnectionStatus::Connecting,
            ConnectionStatus::Authenticating,
            ConnectionStatus::Connected,
        ]
    );
    let signer = responder.seen.lock().unwrap()[0]["signer"].as_str().map(String::from);
    assert_eq!(signer, keys.address());
}

/// Test: connect() while connected is a no-op returning true
#[tokio::test]
async fn connect_is_idempotent() {
    let server = Arc::new(MemoryServer::new());
    let _responder = spawn_responder(server.clone());
    let client = build(&server, plain_config(), keys());
    assert_eq!(client.connect().await, Ok(true));
    assert_eq!(client.connect().await, Ok(true));
    assert_eq!(server.open_count(), 1);
}

/// Test: close() fails pending requests at once and moves to disconnected
#[tokio::test]
async fn close_rejects_pending() {
    let server = MemoryServer::new();
    let client = build(&server, plain_config(), keys());
    let (statuses, _s) = record_status(&client);
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    let c = client.clone();
    let call = tokio::spawn(async move { c.send_request("slow", json!({})).await });
    next_request(&mut conn).await;

    client.close();
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(call.await.expect("join"), Err(ClientError::ConnectionLost));
    assert_eq!(statuses.lock().unwrap().last(), Some(&ConnectionStatus::Disconnected));
    assert_eq!(conn.recv().await, None);
    assert_eq!(client.ping().await, Err(ClientError::NotConnected));
}

/// Test: close() during backoff cancels the retry timer for good
#[tokio::test(start_paused = true)]
async fn close_during_reconnect_stops_retries() {
    let server = MemoryServer::new();
    server.set_refuse(true);
    let config = plain_config()
        .with_max_reconnect_attempts(10)
        .with_reconnect_delay(Duration::from_secs(1));
    let client = build(&server, config, keys());

    let c = client.clone();
    let connecting = tokio::spawn(async move { c.connect().await });
    wait_until_status(&client, ConnectionStatus::Reconnecting).await;
    let opens = server.open_count();

    client.close();
    assert_eq!(connecting.await.expect("join"), Ok(false));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(server.open_count(), opens);
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

/// Test: dropping the last handle closes the socket
#[tokio::test]
async fn dropping_client_closes_socket() {
    let server = MemoryServer::new();
    let client = build(&server, plain_config(), keys());
    assert_eq!(client.connect().await, Ok(true));
    let mut conn = server.accept().await.expect("accept");

    let extra = client.clone();
    drop(client);
    assert_eq!(extra.status(), ConnectionStatus::Connected);
    drop(extra);
    assert_eq!(conn.recv().await, None);
}

/// Test: observers may call back into the client from inside a notification
#[tokio::test]
async fn observer_can_close_client() {
    let server = Arc::new(MemoryServer::new());
    let _responder = spawn_responder(server.clone());
    let client = build(&server, plain_config(), keys());

    let handle = client.clone();
    let seen: Log<ConnectionStatus> = Arc::default();
    let sink = seen.clone();
    let _s = client.on_status_change(move |s| {
        sink.lock().unwrap().push(*s);
        if *s == ConnectionStatus::Connected {
            handle.close();
        }
    });

    assert_eq!(client.connect().await, Ok(true));
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected, ConnectionStatus::Disconnected]
    );
}

/// Signer that takes a second per signature, like a hardware wallet.
struct SlowSigner(LocalSigner);

#[async_trait]
impl Signer for SlowSigner {
    fn address(&self) -> ClientResult<String> { self.0.address() }
    fn public_key(&self) -> ClientResult<String> { self.0.public_key() }
    async fn sign(&self, payload: &[u8]) -> ClientResult<Signature> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.0.sign(payload).await
    }
}

/// Test: a request failed by a disconnect while signing is never sent on the next connection
#[tokio::test(start_paused = true)]
async fn request_lost_while_signing_is_not_replayed() {
    let server = MemoryServer::new();
    let config = plain_config().with_reconnect_delay(Duration::from_millis(100));
    let client = RealtimeClient::builder(config)
        .transport(server.transport())
        .signer(SlowSigner(keys().signer().expect("signer")))
        .build()
        .expect("build");
    assert_eq!(client.connect().await, Ok(true));
    let first = server.accept().await.expect("accept");

    let c = client.clone();
    let transfer = tokio::spawn(async move { c.send_request("transfer", json!({ "amount": 5 })).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Drop the socket mid-signature; the client reconnects before signing ends.
    first.close(Some("restart")).await;
    let mut second = server.accept().await.expect("reconnect");
    wait_until_status(&client, ConnectionStatus::Connected).await;

    assert_eq!(transfer.await.expect("join"), Err(ClientError::ConnectionLost));
    assert_eq!(client.pending_requests(), 0);

    let c = client.clone();
    let ping = tokio::spawn(async move { c.ping().await });
    let (id, frame) = next_request(&mut second).await;
    assert_eq!(frame["method"], "ping", "transfer leaked onto the new connection");
    second.respond(id, json!("pong")).await;
    assert_eq!(ping.await.expect("join"), Ok(()));
}

/// Test: a rejected resubscribe clears the channel, reports the error and still connects
#[tokio::test(start_paused = true)]
async fn rejected_resubscribe_still_connects() {
    let server = MemoryServer::new();
    let config = plain_config().with_reconnect_delay(Duration::from_millis(100));
    let client = build(&server, config, keys());
    let (errors, _e) = record_errors(&client);
    assert_eq!(client.connect().await, Ok(true));
    let mut first = server.accept().await.expect("accept");

    let c = client.clone();
    let call = tokio::spawn(async move { c.subscribe("public").await });
    let (id, _) = next_request(&mut first).await;
    first.respond(id, json!({ "ok": true })).await;
    call.await.expect("join").expect("subscribe");
    assert_eq!(client.current_channel().as_deref(), Some("public"));

    first.close(None).await;
    let mut second = server.accept().await.expect("reconnect");
    let (id, frame) = next_request(&mut second).await;
    assert_eq!(frame["method"], "subscribe");
    assert_eq!(frame["params"]["channel"], "public");
    second.respond_error(id, "channel closed").await;

    wait_until_status(&client, ConnectionStatus::Connected).await;
    assert_eq!(client.current_channel(), None);
    assert!(errors
        .lock()
        .unwrap()
        .contains(&ClientError::Remote { code: None, message: "channel closed".into() }));
}

/// Test: an unanswered auth_request times out into a reconnect, not auth_failed
#[tokio::test(start_paused = true)]
async fn handshake_timeout_reconnects() {
    let server = MemoryServer::new();
    let config = ClientConfig::new("mem://test")
        .with_request_timeout(Duration::from_millis(500))
        .with_reconnect_delay(Duration::from_millis(100));
    let client = build(&server, config, keys());
    let (statuses, _s) = record_status(&client);
    let (errors, _e) = record_errors(&client);

    let c = client.clone();
    let connecting = tokio::spawn(async move { c.connect().await });

    // First socket: swallow auth_request and never answer.
    let mut silent = server.accept().await.expect("accept");
    let (_, frame) = next_request(&mut silent).await;
    assert_eq!(frame["method"], "auth_request");

    // Second socket: complete the handshake.
    let mut second = server.accept().await.expect("reconnect");
    let (id, frame) = next_request(&mut second).await;
    assert_eq!(frame["method"], "auth_request");
    second.respond(id, answer(&frame)).await;
    let (id, frame) = next_request(&mut second).await;
    assert_eq!(frame["method"], "auth_verify");
    second.respond(id, answer(&frame)).await;

    assert_eq!(connecting.await.expect("join"), Ok(true));
    use ConnectionStatus::*;
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![Connecting, Authenticating, Reconnecting, Connecting, Authenticating, Connected]
    );
    assert!(errors
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, ClientError::RequestTimeout { method, .. } if method == "auth_request")));
    drop(silent);
}
