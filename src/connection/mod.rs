//! Connection state machine
//!
//! Pure bookkeeping: which status holds, how many reconnect attempts have
//! been spent, and which events are legal from where. The client's driver
//! task performs the I/O and feeds events in; this type never touches a
//! socket or a timer.
//!
//! ```text
//!              AwaitKey            Connect
//! Disconnected ────────► Waiting ─────────► Connecting ──Opened{auth}──► Authenticating
//!      ▲                                     │  ▲    │                       │      │
//!      │ Close (from anywhere)   Established │  │    │ Lost     AuthRejected │      │ Established
//!      │                                     ▼  │    ▼                       ▼      ▼
//!      │                               Connected│  Reconnecting          AuthFailed Connected
//!      │                                  │     │    │      │
//!      │                                  │Lost │    │      └─GiveUp──► ReconnectFailed
//!      │                                  ▼     │    │
//!      └──── (no auto-reconnect) ◄── Reconnecting ─RetryDue─┘
//! ```

pub mod backoff;

pub use backoff::{Backoff, ReconnectPolicy};

use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Reconnecting,
    ReconnectFailed,
    AuthFailed,
    /// Key generation in progress, no socket yet
    Waiting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::ReconnectFailed => "reconnect_failed",
            Self::AuthFailed => "auth_failed",
            Self::Waiting => "waiting",
        }
    }

    /// States a connection cycle stops in until `connect()` is called again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::ReconnectFailed | Self::AuthFailed)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Key generation started before dialing
    AwaitKey,
    /// Caller asked to connect
    Connect,
    /// Socket is open; `authenticate` selects the handshake state
    Opened { authenticate: bool },
    /// Handshake and resubscription done
    Established,
    AuthRejected,
    /// Socket failed to open or closed unexpectedly
    Lost,
    /// Reconnect delay elapsed
    RetryDue,
    /// Attempts exhausted
    GiveUp,
    Close,
}

impl ConnectionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitKey => "await_key",
            Self::Connect => "connect",
            Self::Opened { .. } => "opened",
            Self::Established => "established",
            Self::AuthRejected => "auth_rejected",
            Self::Lost => "lost",
            Self::RetryDue => "retry_due",
            Self::GiveUp => "give_up",
            Self::Close => "close",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    status: ConnectionStatus,
    attempts: u32,
    auto_reconnect: bool,
    max_attempts: u32,
}

impl ConnectionStateMachine {
    pub fn new(auto_reconnect: bool, max_attempts: u32) -> Self {
        Self { status: ConnectionStatus::Disconnected, attempts: 0, auto_reconnect, max_attempts }
    }

    pub fn status(&self) -> ConnectionStatus { self.status }

    /// Reconnect attempts spent in the current cycle
    pub fn attempts(&self) -> u32 { self.attempts }

    pub fn exhausted(&self) -> bool { self.attempts >= self.max_attempts }

    fn reconnect_enabled(&self) -> bool { self.auto_reconnect && self.max_attempts > 0 }

    /// Apply `event`. `Ok(Some(status))` when the status changed,
    /// `Ok(None)` for a legal no-op.
    pub fn apply(&mut self, event: ConnectionEvent) -> ClientResult<Option<ConnectionStatus>> {
        use ConnectionEvent as E;
        use ConnectionStatus as S;

        let next = match (self.status, event) {
            (_, E::Close) => {
                self.attempts = 0;
                S::Disconnected
            }
            (S::Disconnected | S::AuthFailed | S::ReconnectFailed, E::AwaitKey) => S::Waiting,
            (S::Disconnected | S::AuthFailed | S::ReconnectFailed | S::Waiting, E::Connect) => {
                self.attempts = 0;
                S::Connecting
            }
            // Already connected or mid-cycle: connect() just waits.
            (S::Connected | S::Connecting | S::Authenticating | S::Reconnecting, E::Connect) => self.status,
            (S::Connecting, E::Opened { authenticate: true }) => S::Authenticating,
            (S::Connecting, E::Opened { authenticate: false }) => S::Connecting,
            (S::Connecting | S::Authenticating, E::Established) => {
                self.attempts = 0;
                S::Connected
            }
            (S::Authenticating, E::AuthRejected) => S::AuthFailed,
            (S::Connecting | S::Authenticating | S::Connected, E::Lost) => {
                if self.reconnect_enabled() {
                    self.attempts = self.attempts.saturating_add(1);
                    S::Reconnecting
                } else {
                    S::Disconnected
                }
            }
            (S::Reconnecting, E::RetryDue) => S::Connecting,
            (S::Reconnecting, E::GiveUp) if self.exhausted() => S::ReconnectFailed,
            (from, event) => {
                return Err(ClientError::InvalidTransition {
                    from: from.to_string(),
                    event: event.name().to_string(),
                })
            }
        };

        if next == self.status {
            return Ok(None);
        }
        tracing::debug!(from = %self.status, to = %next, event = event.name(), attempts = self.attempts, "transition");
        self.status = next;
        Ok(Some(next))
    }
}
