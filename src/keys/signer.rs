//! Envelope signing (BIP-340 Schnorr over SHA-256)

use super::{parse_public_key, KeyManager};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use bitcoin::secp256k1::{schnorr, Keypair as SchnorrKeypair, Message, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;

/// 64-byte Schnorr signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn to_hex(&self) -> String { hex::encode(self.0) }

    pub fn from_hex(value: &str) -> ClientResult<Self> {
        let bytes = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| ClientError::Signing(format!("signature hex: {e}")))?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ClientError::Signing(format!("signature must be 64 bytes, got {}", v.len())))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_hex()) }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Signature({})", self.to_hex()) }
}

/// Anything that can sign outbound envelopes.
///
/// Async so hardware or remote signers fit behind the same seam.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Address the server should attribute signed envelopes to
    fn address(&self) -> ClientResult<String>;
    /// Hex public key, sent during authentication
    fn public_key(&self) -> ClientResult<String>;
    async fn sign(&self, payload: &[u8]) -> ClientResult<Signature>;
}

/// Signer backed by a [`KeyManager`] slot. Deterministic: no auxiliary
/// randomness, so equal payloads give equal signatures.
#[derive(Clone)]
pub struct LocalSigner {
    keys: KeyManager,
    secp: Secp256k1<bitcoin::secp256k1::All>,
}

impl LocalSigner {
    pub(crate) fn new(keys: KeyManager) -> Self {
        Self { keys, secp: Secp256k1::new() }
    }

    pub fn sign_sync(&self, payload: &[u8]) -> ClientResult<Signature> {
        if payload.is_empty() {
            return Err(ClientError::Signing("empty payload".into()));
        }
        let message = Message::from_digest(Sha256::digest(payload).into());
        self.keys.with_keypair_ref(|kp| {
            let sk = SecretKey::from_slice(kp.private_key_bytes())
                .map_err(|e| ClientError::Signing(e.to_string()))?;
            let keypair = SchnorrKeypair::from_secret_key(&self.secp, &sk);
            Ok(Signature(self.secp.sign_schnorr_no_aux_rand(&message, &keypair).serialize()))
        })?
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> ClientResult<String> {
        self.keys.address().ok_or(ClientError::NoKey)
    }

    fn public_key(&self) -> ClientResult<String> {
        self.keys.with_keypair_ref(|kp| kp.public_key_hex())
    }

    async fn sign(&self, payload: &[u8]) -> ClientResult<Signature> {
        self.sign_sync(payload)
    }
}

/// Check a signature produced by [`LocalSigner`].
pub fn verify(public_key_hex: &str, payload: &[u8], signature: &Signature) -> bool {
    let Ok(public_key) = parse_public_key(public_key_hex) else { return false };
    let Ok(sig) = schnorr::Signature::from_slice(&signature.0) else { return false };
    let message = Message::from_digest(Sha256::digest(payload).into());
    Secp256k1::verification_only()
        .verify_schnorr(&sig, &message, &public_key.x_only_public_key().0)
        .is_ok()
}
