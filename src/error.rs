//! Client errors

use thiserror::Error;

/// Every failure the client can report.
///
/// `Clone` because one connection failure fans out to every pending
/// request and to every error observer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("No key loaded")]
    NoKey,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Not connected")]
    NotConnected,

    #[error("No channel: subscribe first or pass a channel")]
    NoChannel,

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Request {id} ({method}) timed out")]
    RequestTimeout { id: u64, method: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Reconnect failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error{}: {message}", code.map(|c| format!(" {c}")).unwrap_or_default())]
    Remote { code: Option<i64>, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl ClientError {
    /// Errors that concern the connection as a whole rather than one request.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionLost
                | ClientError::AuthFailed(_)
                | ClientError::ReconnectExhausted { .. }
                | ClientError::Transport(_)
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
