//! Wire format
//!
//! | Direction | Shape | Meaning |
//! |-----------|-------|---------|
//! | out | `{id, method, params, signature, signer, timestamp}` | signed request |
//! | in  | `{id, result}` | request succeeded |
//! | in  | `{id, error}` | request failed (`error` is `{code?, message}` or a string) |
//! | in  | `{type, channel?, payload?}` | push / broadcast |
//!
//! The signature covers the canonical JSON array `[id, method, params, timestamp]`.

use crate::error::{ClientError, ClientResult};
use crate::keys::Signer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Method names used by the client itself
pub mod methods {
    pub const PING: &str = "ping";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const MESSAGE: &str = "message";
    pub const AUTH_REQUEST: &str = "auth_request";
    pub const AUTH_VERIFY: &str = "auth_verify";
}

/// Signed outbound request. Fields are private: once signed it cannot change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    id: u64,
    method: String,
    params: Value,
    signature: String,
    signer: String,
    timestamp: i64,
}

impl SignedEnvelope {
    /// Bytes the signature commits to
    pub fn signing_payload(id: u64, method: &str, params: &Value, timestamp: i64) -> Vec<u8> {
        json!([id, method, params, timestamp]).to_string().into_bytes()
    }

    pub async fn sign(
        signer: &dyn Signer,
        id: u64,
        method: &str,
        params: Value,
        timestamp: i64,
    ) -> ClientResult<Self> {
        let payload = Self::signing_payload(id, method, &params, timestamp);
        let signature = signer.sign(&payload).await?;
        Ok(Self {
            id,
            method: method.to_string(),
            params,
            signature: signature.to_hex(),
            signer: signer.address()?,
            timestamp,
        })
    }

    pub fn id(&self) -> u64 { self.id }
    pub fn method(&self) -> &str { &self.method }
    pub fn params(&self) -> &Value { &self.params }
    pub fn signature(&self) -> &str { &self.signature }
    pub fn signer(&self) -> &str { &self.signer }
    pub fn timestamp(&self) -> i64 { self.timestamp }

    pub fn to_json(&self) -> ClientResult<String> {
        serde_json::to_string(self).map_err(|e| ClientError::Protocol(e.to_string()))
    }
}

/// Push or broadcast delivered to `on_message` observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Response { id: u64, result: Value },
    Failure { id: u64, error: ClientError },
    Push(ServerMessage),
}

impl InboundFrame {
    pub fn parse(text: &str) -> ClientResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ClientError::Protocol(format!("invalid json: {e}")))?;
        let obj = value
            .as_object()
            .ok_or_else(|| ClientError::Protocol("frame is not an object".into()))?;

        if let Some(id) = obj.get("id").filter(|v| !v.is_null()) {
            let id = id
                .as_u64()
                .ok_or_else(|| ClientError::Protocol(format!("invalid id: {id}")))?;
            if let Some(error) = obj.get("error").filter(|v| !v.is_null()) {
                return Ok(Self::Failure { id, error: remote_error(error) });
            }
            if let Some(result) = obj.get("result") {
                return Ok(Self::Response { id, result: result.clone() });
            }
            return Err(ClientError::Protocol(format!("response {id} has neither result nor error")));
        }

        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Protocol("frame has neither id nor type".into()))?;
        Ok(Self::Push(ServerMessage {
            kind: kind.to_string(),
            channel: obj.get("channel").and_then(Value::as_str).map(String::from),
            payload: obj.get("payload").cloned().unwrap_or(Value::Null),
        }))
    }
}

fn remote_error(error: &Value) -> ClientError {
    match error {
        Value::String(message) => ClientError::Remote { code: None, message: message.clone() },
        Value::Object(map) => ClientError::Remote {
            code: map.get("code").and_then(Value::as_i64),
            message: map
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
        },
        other => ClientError::Remote { code: None, message: other.to_string() },
    }
}
