//! Transport - raw message sockets
//!
//! A transport dials a URL and hands back a [`SocketHandle`]: a sender for
//! outbound text frames and a receiver of [`SocketEvent`]s. Dropping the
//! sender closes the socket. The receiver ends with `Closed` (or simply
//! yields `None`) when the peer goes away.

pub mod memory;
#[cfg(feature = "ws")]
pub mod ws;

pub use memory::{MemoryServer, MemoryTransport, ServerConnection};
#[cfg(feature = "ws")]
pub use ws::WsTransport;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Outbound frame queue depth per socket
pub const OUTBOUND_BUFFER: usize = 32;
/// Inbound event queue depth per socket
pub const INBOUND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Frame(String),
    /// Non-fatal socket error; the socket may still close afterwards
    Error(String),
    Closed(Option<String>),
}

#[derive(Debug)]
pub struct SocketHandle {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<SocketEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> anyhow::Result<SocketHandle>;
}
