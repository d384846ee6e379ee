//! RealtimeClient - the façade
//!
//! # Architecture
//!
//! ```text
//! RealtimeClient (cheap to clone, one per session)
//!   │
//!   ├── ConnectionStateMachine   status + attempt counter (under the state lock)
//!   ├── RequestRegistry          id → responder + timeout
//!   ├── Signer                   signs every outbound envelope
//!   ├── Observers × 3            status / error / message fan-out
//!   │
//!   └── driver task (one per connect cycle)
//!         open socket → handshake (auth, resubscribe) → connected
//!              ▲                                          │ socket lost
//!              └──── sleep(backoff) ◄── reconnecting ◄────┘
//! ```
//!
//! Every state mutation happens under a `std::sync::Mutex` that is never
//! held across an `.await`. Observer notifications are queued while the
//! lock is held and delivered after it is released, so callbacks may call
//! back into the client (even `close()`) and still see events in order.
//!
//! # Example
//!
//! ```ignore
//! use beelink::{ClientConfig, KeyManager, RealtimeClient};
//!
//! let client = RealtimeClient::builder(ClientConfig::new("wss://example.org/ws"))
//!     .key_manager(KeyManager::new())
//!     .build()?;
//!
//! let _status = client.on_status_change(|s| println!("status: {s}"));
//! if client.connect().await? {
//!     client.subscribe("public").await?;
//!     client.publish_message("hello", None).await?;
//! }
//! client.close();
//! ```

pub mod config;

pub use config::ClientConfig;

use crate::connection::{ConnectionEvent, ConnectionStateMachine, ConnectionStatus, ReconnectPolicy};
use crate::envelope::{methods, InboundFrame, ServerMessage, SignedEnvelope};
use crate::error::{ClientError, ClientResult};
use crate::events::{Observers, Subscription};
use crate::keys::{KeyManager, Signer};
use crate::lock;
use crate::registry::RequestRegistry;
use crate::transport::{SocketEvent, SocketHandle, Transport};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

enum KeySource {
    Signer(Arc<dyn Signer>),
    /// Signs with the manager's key, generating one on first connect
    Keys(KeyManager),
    None,
}

enum ClientEvent {
    Status(ConnectionStatus),
    Error(ClientError),
    Message(ServerMessage),
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<ClientEvent>,
    draining: bool,
}

struct State {
    machine: ConnectionStateMachine,
    /// Bumped by every connect cycle and every close; stale tasks compare against it.
    generation: u64,
    /// Number of times `Connected` was reached
    epochs: u64,
    outbound: Option<mpsc::Sender<String>>,
    channel: Option<String>,
    driver: Option<JoinHandle<()>>,
}

/// Which requests may use the socket
#[derive(Clone, Copy)]
enum Scope {
    /// Caller requests: only on the connected epoch they were issued on
    Connected(u64),
    /// Handshake requests of one connect cycle
    Handshake(u64),
}

enum EpochEnd {
    Lost,
    Finished,
}

struct Inner {
    config: ClientConfig,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    key_source: KeySource,
    registry: RequestRegistry,
    state: Mutex<State>,
    outbox: Mutex<Outbox>,
    status_tx: watch::Sender<ConnectionStatus>,
    status_observers: Observers<ConnectionStatus>,
    error_observers: Observers<ClientError>,
    message_observers: Observers<ServerMessage>,
}

/// Closes the session when the last client handle goes away.
struct CloseOnDrop(Arc<Inner>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) { self.0.close(); }
}

#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
    _guard: Arc<CloseOnDrop>,
}

pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    key_source: KeySource,
}

impl ClientBuilder {
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.key_source = KeySource::Signer(Arc::new(signer));
        self
    }

    pub fn shared_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.key_source = KeySource::Signer(signer);
        self
    }

    /// Sign with `keys`; if it holds no key, `connect()` generates one
    /// (status `waiting` meanwhile).
    pub fn key_manager(mut self, keys: KeyManager) -> Self {
        self.key_source = KeySource::Keys(keys);
        self
    }

    pub fn build(self) -> ClientResult<RealtimeClient> {
        self.config.validate()?;
        let transport = match self.transport {
            Some(t) => t,
            None => default_transport()?,
        };
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let inner = Arc::new(Inner {
            policy: self.config.reconnect_policy(),
            registry: RequestRegistry::new(self.config.request_timeout()),
            state: Mutex::new(State {
                machine: ConnectionStateMachine::new(self.config.auto_reconnect, self.config.max_reconnect_attempts),
                generation: 0,
                epochs: 0,
                outbound: None,
                channel: None,
                driver: None,
            }),
            outbox: Mutex::new(Outbox::default()),
            status_tx,
            status_observers: Observers::new("status"),
            error_observers: Observers::new("error"),
            message_observers: Observers::new("message"),
            config: self.config,
            transport,
            key_source: self.key_source,
        });
        Ok(RealtimeClient { _guard: Arc::new(CloseOnDrop(inner.clone())), inner })
    }
}

#[cfg(feature = "ws")]
fn default_transport() -> ClientResult<Arc<dyn Transport>> {
    Ok(Arc::new(crate::transport::WsTransport::new()))
}

#[cfg(not(feature = "ws"))]
fn default_transport() -> ClientResult<Arc<dyn Transport>> {
    Err(ClientError::Config("no transport configured".into()))
}

impl RealtimeClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder { config, transport: None, key_source: KeySource::None }
    }

    pub fn config(&self) -> &ClientConfig { &self.inner.config }

    pub fn status(&self) -> ConnectionStatus { *self.inner.status_tx.borrow() }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> { self.inner.status_tx.subscribe() }

    pub fn is_connected(&self) -> bool { self.status() == ConnectionStatus::Connected }

    /// Channel currently receiving broadcasts, if any
    pub fn current_channel(&self) -> Option<String> { lock(&self.inner.state).channel.clone() }

    pub fn address(&self) -> Option<String> {
        self.inner.signer().and_then(|s| s.address().ok())
    }

    pub fn pending_requests(&self) -> usize { self.inner.registry.len() }

    pub fn on_status_change(&self, f: impl Fn(&ConnectionStatus) + Send + Sync + 'static) -> Subscription {
        self.inner.status_observers.subscribe(f)
    }

    pub fn on_error(&self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Subscription {
        self.inner.error_observers.subscribe(f)
    }

    pub fn on_message(&self, f: impl Fn(&ServerMessage) + Send + Sync + 'static) -> Subscription {
        self.inner.message_observers.subscribe(f)
    }

    /// Connect and wait for the cycle's outcome.
    ///
    /// `Ok(true)` once connected (immediately if already connected),
    /// `Ok(false)` if the cycle ends in `auth_failed`, `reconnect_failed`
    /// or `disconnected`. `Err(NoKey)` when the client has no way to sign.
    pub async fn connect(&self) -> ClientResult<bool> {
        let inner = &self.inner;
        let (start, since, mut status_rx) = {
            let mut state = lock(&inner.state);
            let status = state.machine.status();
            if status == ConnectionStatus::Connected {
                return Ok(true);
            }
            let start = if status.is_terminal() {
                let signer = inner.signer();
                if signer.is_none() && !inner.can_generate_key() {
                    return Err(ClientError::NoKey);
                }
                state.generation += 1;
                let event = if signer.is_some() { ConnectionEvent::Connect } else { ConnectionEvent::AwaitKey };
                inner.transition(&mut state, event)?;
                Some((state.generation, signer))
            } else {
                None
            };
            (start, state.epochs, inner.status_tx.subscribe())
        };
        inner.flush();

        if let Some((generation, signer)) = start {
            tracing::info!(url = %inner.config.url, generation, "connecting");
            let task = tokio::spawn(inner.clone().drive(generation, signer));
            let mut state = lock(&inner.state);
            if state.generation == generation {
                state.driver = Some(task);
            } else {
                task.abort();
            }
        }

        loop {
            {
                let state = lock(&inner.state);
                if state.epochs > since {
                    return Ok(true);
                }
                if state.machine.status().is_terminal() {
                    return Ok(false);
                }
            }
            if status_rx.changed().await.is_err() {
                return Ok(false);
            }
        }
    }

    /// Tear down immediately: cancel timers, fail pending requests, go `disconnected`.
    pub fn close(&self) { self.inner.close(); }

    /// Sign and send a request, then wait for its response.
    pub async fn send_request(&self, method: &str, params: Value) -> ClientResult<Value> {
        let epoch = {
            let state = lock(&self.inner.state);
            if state.machine.status() != ConnectionStatus::Connected {
                return Err(ClientError::NotConnected);
            }
            state.epochs
        };
        self.inner.request(Scope::Connected(epoch), method, params).await
    }

    pub async fn ping(&self) -> ClientResult<()> {
        self.send_request(methods::PING, json!([])).await.map(|_| ())
    }

    /// Subscribe to `channel`; it becomes the current channel once acknowledged.
    pub async fn subscribe(&self, channel: &str) -> ClientResult<()> {
        self.send_request(methods::SUBSCRIBE, json!({ "channel": channel })).await?;
        let previous = lock(&self.inner.state).channel.replace(channel.to_string());
        tracing::info!(%channel, ?previous, "subscribed");
        Ok(())
    }

    /// Leave the current channel, if any.
    pub async fn unsubscribe(&self) -> ClientResult<()> {
        let Some(channel) = self.current_channel() else { return Ok(()) };
        self.send_request(methods::UNSUBSCRIBE, json!({ "channel": channel })).await?;
        let mut state = lock(&self.inner.state);
        if state.channel.as_deref() == Some(channel.as_str()) {
            state.channel = None;
        }
        tracing::info!(%channel, "unsubscribed");
        Ok(())
    }

    /// Publish `text` to `channel`, or to the current channel when `None`.
    pub async fn publish_message(&self, text: &str, channel: Option<&str>) -> ClientResult<()> {
        let channel = match channel {
            Some(c) => c.to_string(),
            None => self.current_channel().ok_or(ClientError::NoChannel)?,
        };
        self.send_request(methods::MESSAGE, json!({ "channel": channel, "message": text }))
            .await
            .map(|_| ())
    }
}

impl Inner {
    fn signer(&self) -> Option<Arc<dyn Signer>> {
        match &self.key_source {
            KeySource::Signer(s) => Some(s.clone()),
            KeySource::Keys(keys) => keys.signer().ok().map(|s| Arc::new(s) as Arc<dyn Signer>),
            KeySource::None => None,
        }
    }

    fn can_generate_key(&self) -> bool { matches!(self.key_source, KeySource::Keys(_)) }

    fn is_current(&self, generation: u64) -> bool { lock(&self.state).generation == generation }

    /// Apply `event` and queue the status change. Caller holds the state lock
    /// and must `flush` after releasing it.
    fn transition(&self, state: &mut State, event: ConnectionEvent) -> ClientResult<Option<ConnectionStatus>> {
        let changed = state.machine.apply(event)?;
        if let Some(status) = changed {
            if status == ConnectionStatus::Connected {
                state.epochs += 1;
            }
            tracing::info!(%status, attempts = state.machine.attempts(), "connection status");
            self.status_tx.send_replace(status);
            self.enqueue(ClientEvent::Status(status));
        }
        Ok(changed)
    }

    fn enqueue(&self, event: ClientEvent) {
        lock(&self.outbox).queue.push_back(event);
    }

    fn emit(&self, event: ClientEvent) {
        self.enqueue(event);
        self.flush();
    }

    /// Deliver queued events. If another task is already delivering, it
    /// picks ours up before it stops.
    fn flush(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        loop {
            let next = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            match next {
                ClientEvent::Status(status) => { self.status_observers.emit(&status); }
                ClientEvent::Error(error) => { self.error_observers.emit(&error); }
                ClientEvent::Message(message) => { self.message_observers.emit(&message); }
            }
        }
    }

    fn close(&self) {
        {
            let mut state = lock(&self.state);
            state.generation += 1;
            if let Some(driver) = state.driver.take() {
                driver.abort();
            }
            state.outbound = None;
            if let Err(e) = self.transition(&mut state, ConnectionEvent::Close) {
                tracing::warn!(error = %e, "close transition rejected");
            }
            let rejected = self.registry.reject_all(ClientError::ConnectionLost);
            if rejected > 0 {
                tracing::debug!(rejected, "pending requests failed on close");
            }
        }
        self.flush();
    }

    async fn drive(self: Arc<Self>, generation: u64, signer: Option<Arc<dyn Signer>>) {
        if signer.is_none() && !self.prepare_key(generation).await {
            return;
        }
        self.run(generation).await;
    }

    /// `waiting` → generate a key → `connecting`. False if the cycle ended.
    async fn prepare_key(&self, generation: u64) -> bool {
        let KeySource::Keys(keys) = &self.key_source else { return false };
        let keys = keys.clone();
        let generated = tokio::task::spawn_blocking(move || keys.generate_keypair())
            .await
            .unwrap_or_else(|e| Err(ClientError::KeyGeneration(e.to_string())));

        let proceed = {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return false;
            }
            match generated {
                Ok(keypair) => {
                    tracing::info!(address = %keypair.address(), "keypair ready");
                    self.transition(&mut state, ConnectionEvent::Connect).is_ok()
                }
                Err(e) => {
                    tracing::error!(error = %e, "key generation failed");
                    let _ = self.transition(&mut state, ConnectionEvent::Close);
                    self.enqueue(ClientEvent::Error(e));
                    false
                }
            }
        };
        self.flush();
        proceed
    }

    async fn run(&self, generation: u64) {
        loop {
            let socket_opened = match self.transport.open(&self.config.url).await {
                Ok(handle) => match self.run_epoch(generation, handle).await {
                    EpochEnd::Lost => true,
                    EpochEnd::Finished => return,
                },
                Err(e) => {
                    if !self.is_current(generation) {
                        return;
                    }
                    tracing::warn!(url = %self.config.url, error = %e, "connect failed");
                    self.emit(ClientEvent::Error(ClientError::Transport(e.to_string())));
                    false
                }
            };

            let Some(delay) = self.on_lost(generation, socket_opened) else { return };
            tracing::warn!(delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::time::sleep(delay).await;

            {
                let mut state = lock(&self.state);
                if state.generation != generation {
                    return;
                }
                if let Err(e) = self.transition(&mut state, ConnectionEvent::RetryDue) {
                    tracing::warn!(error = %e, "retry transition rejected");
                    return;
                }
            }
            self.flush();
        }
    }

    /// Leave the current epoch. Returns the delay before the next attempt,
    /// or `None` when this cycle is over.
    fn on_lost(&self, generation: u64, socket_opened: bool) -> Option<Duration> {
        let next = {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return None;
            }
            state.outbound = None;
            let rejected = self.registry.reject_all(ClientError::ConnectionLost);
            let transitioned = self.transition(&mut state, ConnectionEvent::Lost);
            if socket_opened {
                tracing::warn!(rejected, "connection lost");
                self.enqueue(ClientEvent::Error(ClientError::ConnectionLost));
            }
            match transitioned {
                Err(e) => {
                    tracing::warn!(error = %e, "lost transition rejected");
                    None
                }
                Ok(_) if state.machine.status() != ConnectionStatus::Reconnecting => None,
                Ok(_) if state.machine.exhausted() => {
                    let attempts = state.machine.attempts();
                    let _ = self.transition(&mut state, ConnectionEvent::GiveUp);
                    tracing::error!(attempts, "reconnect attempts exhausted");
                    self.enqueue(ClientEvent::Error(ClientError::ReconnectExhausted { attempts }));
                    None
                }
                Ok(_) => Some(self.policy.delay(state.machine.attempts())),
            }
        };
        self.flush();
        next
    }

    /// One socket's lifetime: handshake, then dispatch until it closes.
    async fn run_epoch(&self, generation: u64, handle: SocketHandle) -> EpochEnd {
        let SocketHandle { outbound, mut inbound } = handle;
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return EpochEnd::Finished;
            }
            state.outbound = Some(outbound);
            let opened = ConnectionEvent::Opened { authenticate: self.config.authenticate };
            if let Err(e) = self.transition(&mut state, opened) {
                tracing::warn!(error = %e, "open transition rejected");
                state.outbound = None;
                return EpochEnd::Finished;
            }
        }
        self.flush();

        let handshake = self.handshake(generation);
        tokio::pin!(handshake);
        let mut ready = false;

        loop {
            tokio::select! {
                outcome = &mut handshake, if !ready => match outcome {
                    Ok(()) => {
                        {
                            let mut state = lock(&self.state);
                            if state.generation != generation {
                                return EpochEnd::Finished;
                            }
                            if let Err(e) = self.transition(&mut state, ConnectionEvent::Established) {
                                tracing::warn!(error = %e, "established transition rejected");
                                return EpochEnd::Finished;
                            }
                        }
                        self.flush();
                        ready = true;
                    }
                    Err(ClientError::AuthFailed(reason)) => {
                        self.on_auth_rejected(generation, reason);
                        return EpochEnd::Finished;
                    }
                    Err(ClientError::ConnectionLost) => return EpochEnd::Lost,
                    Err(e) => {
                        tracing::warn!(error = %e, "handshake failed");
                        self.emit(ClientEvent::Error(e));
                        return EpochEnd::Lost;
                    }
                },
                event = inbound.recv() => match event {
                    Some(SocketEvent::Frame(text)) => self.dispatch(&text),
                    Some(SocketEvent::Error(e)) => {
                        tracing::warn!(error = %e, "socket error");
                        self.emit(ClientEvent::Error(ClientError::Transport(e)));
                    }
                    Some(SocketEvent::Closed(reason)) => {
                        tracing::debug!(?reason, "socket closed");
                        return EpochEnd::Lost;
                    }
                    None => return EpochEnd::Lost,
                },
            }
        }
    }

    fn on_auth_rejected(&self, generation: u64, reason: String) {
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return;
            }
            state.outbound = None;
            if let Err(e) = self.transition(&mut state, ConnectionEvent::AuthRejected) {
                tracing::warn!(error = %e, "auth transition rejected");
            }
            self.registry.reject_all(ClientError::AuthFailed(reason.clone()));
            tracing::error!(%reason, "authentication rejected");
            self.enqueue(ClientEvent::Error(ClientError::AuthFailed(reason)));
        }
        self.flush();
    }

    /// Authenticate (if configured) and restore the current subscription.
    async fn handshake(&self, generation: u64) -> ClientResult<()> {
        let scope = Scope::Handshake(generation);
        if self.config.authenticate {
            let signer = self.signer().ok_or_else(|| ClientError::AuthFailed("no signing key".into()))?;
            let params = json!({
                "address": signer.address().map_err(auth_error)?,
                "public_key": signer.public_key().map_err(auth_error)?,
            });
            let result = self.request(scope, methods::AUTH_REQUEST, params).await.map_err(auth_error)?;
            if result.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(ClientError::AuthFailed("server declined auth_request".into()));
            }
            if let Some(challenge) = result.get("challenge").and_then(Value::as_str) {
                self.request(scope, methods::AUTH_VERIFY, json!({ "challenge": challenge }))
                    .await
                    .map_err(auth_error)?;
            }
            tracing::debug!("authenticated");
        }

        let channel = lock(&self.state).channel.clone();
        if let Some(channel) = channel {
            match self.request(scope, methods::SUBSCRIBE, json!({ "channel": channel })).await {
                Ok(_) => tracing::info!(%channel, "resubscribed"),
                Err(e @ ClientError::Remote { .. }) => {
                    tracing::warn!(%channel, error = %e, "resubscribe rejected");
                    {
                        let mut state = lock(&self.state);
                        if state.channel.as_deref() == Some(channel.as_str()) {
                            state.channel = None;
                        }
                    }
                    self.emit(ClientEvent::Error(e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn request(&self, scope: Scope, method: &str, params: Value) -> ClientResult<Value> {
        let signer = self.signer().ok_or(ClientError::NoKey)?;
        let (id, pending) = self.registry.register(method);
        let timestamp = chrono::Utc::now().timestamp_millis();

        let frame = match SignedEnvelope::sign(signer.as_ref(), id, method, params, timestamp)
            .await
            .and_then(|envelope| envelope.to_json())
        {
            Ok(frame) => frame,
            Err(e) => {
                self.registry.reject(id, e.clone());
                return Err(e);
            }
        };

        let outbound = {
            let state = lock(&self.state);
            let same_epoch = match scope {
                Scope::Connected(epoch) => {
                    state.machine.status() == ConnectionStatus::Connected && state.epochs == epoch
                }
                Scope::Handshake(generation) => state.generation == generation,
            };
            // A request already failed by a disconnect must never reach a later socket.
            if same_epoch && self.registry.contains(id) { state.outbound.clone() } else { None }
        };

        match outbound {
            Some(tx) => {
                tracing::debug!(id, method, timeout_ms = self.registry.timeout().as_millis() as u64, "sending request");
                if tx.send(frame).await.is_err() {
                    self.registry.reject(id, ClientError::ConnectionLost);
                }
            }
            None => {
                // Connection went away while signing.
                tracing::debug!(id, method, "request dropped before send");
                self.registry.reject(id, ClientError::ConnectionLost);
            }
        }
        pending.await
    }

    fn dispatch(&self, text: &str) {
        match InboundFrame::parse(text) {
            Ok(InboundFrame::Response { id, result }) => {
                if !self.registry.resolve(id, result) {
                    tracing::debug!(id, "late or unknown response dropped");
                }
            }
            Ok(InboundFrame::Failure { id, error }) => {
                if !self.registry.reject(id, error) {
                    tracing::debug!(id, "late or unknown error response dropped");
                }
            }
            Ok(InboundFrame::Push(message)) => {
                tracing::debug!(kind = %message.kind, channel = ?message.channel, "push");
                self.emit(ClientEvent::Message(message));
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame ignored");
                self.emit(ClientEvent::Error(e));
            }
        }
    }
}

fn auth_error(e: ClientError) -> ClientError {
    match e {
        ClientError::Remote { message, .. } => ClientError::AuthFailed(message),
        ClientError::NoKey => ClientError::AuthFailed("no signing key".into()),
        ClientError::Signing(reason) => ClientError::AuthFailed(reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryServer;

    fn client(server: &MemoryServer) -> RealtimeClient {
        let keys = KeyManager::new();
        keys.generate_keypair().expect("generate");
        RealtimeClient::builder(ClientConfig::new("mem://test").with_authentication(false))
            .transport(server.transport())
            .key_manager(keys)
            .build()
            .expect("build")
    }

    #[tokio::test]
    async fn test_requests_require_connection() {
        let server = MemoryServer::new();
        let client = client(&server);
        assert_eq!(client.ping().await, Err(ClientError::NotConnected));
        assert_eq!(client.subscribe("public").await, Err(ClientError::NotConnected));
        assert_eq!(client.send_request("x", json!({})).await, Err(ClientError::NotConnected));
        assert_eq!(server.open_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_without_channel() {
        let server = MemoryServer::new();
        let client = client(&server);
        assert_eq!(client.publish_message("hi", None).await, Err(ClientError::NoChannel));
    }

    #[tokio::test]
    async fn test_connect_without_signer_is_programmer_error() {
        let server = MemoryServer::new();
        let client = RealtimeClient::builder(ClientConfig::new("mem://test"))
            .transport(server.transport())
            .build()
            .expect("build");
        assert_eq!(client.connect().await, Err(ClientError::NoKey));
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_close_when_idle() {
        let server = MemoryServer::new();
        let client = client(&server);
        client.close();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert_eq!(client.pending_requests(), 0);
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(
            auth_error(ClientError::Remote { code: Some(1), message: "bad sig".into() }),
            ClientError::AuthFailed("bad sig".into())
        );
        assert_eq!(auth_error(ClientError::ConnectionLost), ClientError::ConnectionLost);
    }
}
