//! RequestRegistry - in-flight requests keyed by id
//!
//! Each registration owns a responder and a timeout task. Whichever of
//! `resolve`, `reject`, `expire` or `reject_all` reaches the entry first
//! removes it; everything after that is a silent no-op.

use crate::error::{ClientError, ClientResult};
use crate::lock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct PendingRequest {
    method: String,
    created_at: Instant,
    timeout: JoinHandle<()>,
    responder: oneshot::Sender<ClientResult<Value>>,
}

impl PendingRequest {
    fn complete(self, outcome: ClientResult<Value>) {
        self.timeout.abort();
        // Receiver may be gone if the caller stopped waiting.
        let _ = self.responder.send(outcome);
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

#[derive(Clone)]
pub struct RequestRegistry {
    state: Arc<Mutex<RegistryState>>,
    timeout: Duration,
}

impl RequestRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self { state: Arc::new(Mutex::new(RegistryState::default())), timeout }
    }

    pub fn timeout(&self) -> Duration { self.timeout }

    /// Allocate a fresh id and start its timeout. Must be called inside a
    /// tokio runtime.
    pub fn register(&self, method: &str) -> (u64, PendingResponse) {
        let (tx, rx) = oneshot::channel();
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;

        let weak: Weak<Mutex<RegistryState>> = Arc::downgrade(&self.state);
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(state) = weak.upgrade() {
                expire_entry(&state, id);
            }
        });

        state.pending.insert(id, PendingRequest {
            method: method.to_string(),
            created_at: Instant::now(),
            timeout: timer,
            responder: tx,
        });
        (id, PendingResponse { id, rx })
    }

    /// Complete `id` with a result. Returns false for unknown ids.
    pub fn resolve(&self, id: u64, result: Value) -> bool {
        self.finish(id, Ok(result))
    }

    /// Fail `id` with an error. Returns false for unknown ids.
    pub fn reject(&self, id: u64, error: ClientError) -> bool {
        self.finish(id, Err(error))
    }

    /// Timer path: fail `id` with `RequestTimeout` if still pending.
    pub fn expire(&self, id: u64) -> bool {
        expire_entry(&self.state, id)
    }

    /// Fail every pending request with `error` and empty the registry.
    pub fn reject_all(&self, error: ClientError) -> usize {
        let drained: Vec<(u64, PendingRequest)> = lock(&self.state).pending.drain().collect();
        let count = drained.len();
        for (id, request) in drained {
            tracing::debug!(id, method = %request.method, %error, "rejecting pending request");
            request.complete(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize { lock(&self.state).pending.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn contains(&self, id: u64) -> bool { lock(&self.state).pending.contains_key(&id) }

    fn finish(&self, id: u64, outcome: ClientResult<Value>) -> bool {
        let entry = lock(&self.state).pending.remove(&id);
        match entry {
            Some(request) => {
                tracing::debug!(
                    id,
                    method = %request.method,
                    elapsed_ms = request.created_at.elapsed().as_millis() as u64,
                    ok = outcome.is_ok(),
                    "request completed"
                );
                request.complete(outcome);
                true
            }
            None => {
                tracing::debug!(id, "response for unknown request ignored");
                false
            }
        }
    }
}

fn expire_entry(state: &Mutex<RegistryState>, id: u64) -> bool {
    let entry = lock(state).pending.remove(&id);
    match entry {
        Some(request) => {
            tracing::warn!(id, method = %request.method, "request timed out");
            let error = ClientError::RequestTimeout { id, method: request.method.clone() };
            // Running inside the timer task: sending without aborting it.
            let _ = request.responder.send(Err(error));
            true
        }
        None => false,
    }
}

impl Drop for RegistryState {
    fn drop(&mut self) {
        for (_, request) in self.pending.drain() {
            request.complete(Err(ClientError::ConnectionLost));
        }
    }
}

/// Future for one registered request.
#[derive(Debug)]
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<ClientResult<Value>>,
}

impl PendingResponse {
    pub fn id(&self) -> u64 { self.id }
}

impl Future for PendingResponse {
    type Output = ClientResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::ConnectionLost)))
    }
}
