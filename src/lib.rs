//! Beelink: authenticated realtime messaging client. Sign, send, subscribe.
//!
//! # Architecture
//!
//! ```text
//! RealtimeClient (entry point)
//!   │
//!   ├── KeyManager / Signer        secp256k1 keypair, Schnorr signatures
//!   ├── ConnectionStateMachine     disconnected → connecting → ... → connected
//!   ├── RequestRegistry            id correlation + per-request timeouts
//!   ├── Observers                  status / error / message fan-out
//!   │
//!   └── Transport                  WebSocket (tokio-tungstenite) or in-memory
//! ```
//!
//! # Operations
//!
//! | Operation | Method | Description |
//! |-----------|--------|-------------|
//! | connect | `client.connect()` | Open, authenticate, resubscribe |
//! | request | `client.send_request(method, params)` | Signed request, awaits response |
//! | subscribe | `client.subscribe(channel)` | Join a broadcast channel |
//! | publish | `client.publish_message(text, channel)` | Post to a channel |
//! | close | `client.close()` | Tear down, fail pending requests |
//!
//! # Features
//!
//! - `ws` (default) - WebSocket transport and the `beelink` CLI
//!
//! # Usage
//!
//! ```ignore
//! use beelink::{ClientConfig, KeyManager, RealtimeClient};
//!
//! let client = RealtimeClient::builder(ClientConfig::from_env()?)
//!     .key_manager(KeyManager::new())
//!     .build()?;
//!
//! let _messages = client.on_message(|m| println!("{}: {}", m.kind, m.payload));
//! client.connect().await?;
//! client.subscribe("public").await?;
//! ```

pub mod client;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod events;
pub mod keys;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod transport;

pub use client::{ClientBuilder, ClientConfig, RealtimeClient};
pub use connection::{Backoff, ConnectionEvent, ConnectionStateMachine, ConnectionStatus, ReconnectPolicy};
pub use envelope::{InboundFrame, ServerMessage, SignedEnvelope};
pub use error::{ClientError, ClientResult};
pub use events::{Observers, Subscription};
pub use keys::{derive_address, verify, KeyManager, KeyStore, Keypair, LocalSigner, Signature, Signer};
pub use registry::{PendingResponse, RequestRegistry};
pub use runtime::{install_signal_handlers, Shutdown};
pub use transport::{MemoryServer, MemoryTransport, ServerConnection, SocketEvent, SocketHandle, Transport};

#[cfg(feature = "ws")]
pub use transport::WsTransport;

use std::sync::{Mutex, MutexGuard};

/// Lock ignoring poison: a panicking observer must not wedge the client.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
