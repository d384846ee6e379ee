//! In-process transport
//!
//! A [`MemoryServer`] hands out [`MemoryTransport`]s; every `open` on one of
//! them shows up as a [`ServerConnection`] on the server side. Used by the
//! test suite and handy for embedding the client without a network.

use super::{SocketEvent, SocketHandle, Transport, INBOUND_BUFFER, OUTBOUND_BUFFER};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

struct Shared {
    accept_tx: mpsc::UnboundedSender<ServerConnection>,
    refuse: AtomicBool,
    opens: AtomicUsize,
}

/// Server end of the in-memory transport.
pub struct MemoryServer {
    shared: Arc<Shared>,
    accept_rx: Mutex<mpsc::UnboundedReceiver<ServerConnection>>,
}

impl Default for MemoryServer {
    fn default() -> Self { Self::new() }
}

impl MemoryServer {
    pub fn new() -> Self {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared { accept_tx, refuse: AtomicBool::new(false), opens: AtomicUsize::new(0) }),
            accept_rx: Mutex::new(accept_rx),
        }
    }

    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport { shared: self.shared.clone() }
    }

    /// Make every subsequent `open` fail (or succeed again).
    pub fn set_refuse(&self, refuse: bool) {
        self.shared.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `open` calls seen, refused ones included
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Next accepted connection
    pub async fn accept(&self) -> Option<ServerConnection> {
        self.accept_rx.lock().await.recv().await
    }
}

#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> anyhow::Result<SocketHandle> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused: {url}");
        }

        let (out_tx, out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<SocketEvent>(INBOUND_BUFFER);
        let connection = ServerConnection { url: url.to_string(), from_client: out_rx, to_client: in_tx };
        self.shared
            .accept_tx
            .send(connection)
            .map_err(|_| anyhow::anyhow!("memory server gone"))?;
        Ok(SocketHandle { outbound: out_tx, inbound: in_rx })
    }
}

/// One accepted socket, seen from the server.
pub struct ServerConnection {
    url: String,
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<SocketEvent>,
}

impl ServerConnection {
    pub fn url(&self) -> &str { &self.url }

    /// Next frame from the client; `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame parsed as JSON. Non-JSON frames are skipped.
    pub async fn recv_json(&mut self) -> Option<Value> {
        loop {
            let frame = self.recv().await?;
            if let Ok(value) = serde_json::from_str(&frame) {
                return Some(value);
            }
        }
    }

    pub async fn send(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(SocketEvent::Frame(frame.into())).await.is_ok()
    }

    pub async fn respond(&self, id: u64, result: Value) -> bool {
        self.send(json!({ "id": id, "result": result }).to_string()).await
    }

    pub async fn respond_error(&self, id: u64, message: &str) -> bool {
        self.send(json!({ "id": id, "error": { "message": message } }).to_string()).await
    }

    pub async fn push(&self, kind: &str, channel: Option<&str>, payload: Value) -> bool {
        self.send(json!({ "type": kind, "channel": channel, "payload": payload }).to_string()).await
    }

    /// Close from the server side.
    pub async fn close(self, reason: Option<&str>) {
        let _ = self.to_client.send(SocketEvent::Closed(reason.map(String::from))).await;
    }
}
