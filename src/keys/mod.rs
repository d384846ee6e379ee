//! Keys - local authentication identity
//!
//! The client authenticates with a secp256k1 keypair it owns. The private
//! key never leaves this module except through [`LocalSigner`], and is
//! zeroized when the [`KeyManager`] is cleared or the [`Keypair`] dropped.
//!
//! ## Address Derivation
//!
//! ```text
//! private key (32 bytes, OS randomness)
//!     │
//!     └── public key (33-byte compressed SEC1)
//!             │
//!             └── SHA-256 → last 20 bytes → "0x" + hex  (address)
//! ```
//!
//! Persistence is the caller's business. [`KeyStore`] is a plain JSON file
//! store for the CLI; embedders can keep keys wherever they like and hand
//! them back through [`KeyManager::load`].

mod signer;
mod store;

pub use signer::{verify, LocalSigner, Signature, Signer};
pub use store::KeyStore;

use crate::error::{ClientError, ClientResult};
use crate::lock;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a derived address in bytes (before hex encoding)
pub const ADDRESS_LEN: usize = 20;

/// Derive the address for a public key.
///
/// Pure and total: the same key always yields the same address.
pub fn derive_address(public_key: &PublicKey) -> String {
    let digest = Sha256::digest(public_key.serialize());
    format!("0x{}", hex::encode(&digest[digest.len() - ADDRESS_LEN..]))
}

/// Parse a hex-encoded compressed (or uncompressed) public key.
pub fn parse_public_key(hex_str: &str) -> ClientResult<PublicKey> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|e| ClientError::InvalidKey(format!("public key hex: {e}")))?;
    PublicKey::from_slice(&bytes).map_err(|e| ClientError::InvalidKey(e.to_string()))
}

/// Authentication keypair.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    #[zeroize(skip)]
    public_key: PublicKey,
    private_key: [u8; 32],
    #[zeroize(skip)]
    address: String,
}

impl Keypair {
    /// Build a keypair from raw private key bytes.
    pub fn from_private_key(private_key: [u8; 32]) -> ClientResult<Self> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&private_key)
            .map_err(|e| ClientError::InvalidKey(e.to_string()))?;
        let public_key = PublicKey::from_secret_key(&secp, &sk);
        Ok(Self { address: derive_address(&public_key), public_key, private_key })
    }

    /// Rebuild a keypair from persisted hex parts.
    ///
    /// A missing address is backfilled; a present one must match the key.
    pub fn from_parts(public_key: &str, private_key: &str, address: Option<&str>) -> ClientResult<Self> {
        let mut raw = hex::decode(private_key.trim_start_matches("0x"))
            .map_err(|e| ClientError::InvalidKey(format!("private key hex: {e}")))?;
        let bytes: [u8; 32] = match raw.as_slice().try_into() {
            Ok(b) => b,
            Err(_) => {
                let got = raw.len();
                raw.zeroize();
                return Err(ClientError::InvalidKey(format!("private key must be 32 bytes, got {got}")));
            }
        };
        raw.zeroize();

        let keypair = Self::from_private_key(bytes)?;
        if keypair.public_key != parse_public_key(public_key)? {
            return Err(ClientError::InvalidKey("public key does not match private key".into()));
        }
        if let Some(address) = address {
            if !address.eq_ignore_ascii_case(&keypair.address) {
                return Err(ClientError::InvalidKey(format!(
                    "address {address} does not match public key ({})",
                    keypair.address
                )));
            }
        }
        Ok(keypair)
    }

    pub fn public_key(&self) -> &PublicKey { &self.public_key }

    pub fn public_key_hex(&self) -> String { hex::encode(self.public_key.serialize()) }

    pub fn address(&self) -> &str { &self.address }

    pub(crate) fn private_key_bytes(&self) -> &[u8; 32] { &self.private_key }

    pub fn private_key_hex(&self) -> String { hex::encode(self.private_key) }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key_hex())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Owns the active keypair. Clones share the same slot, so a clear is
/// visible to every signer handed out earlier.
#[derive(Clone, Default)]
pub struct KeyManager {
    slot: Arc<Mutex<Option<Keypair>>>,
}

impl KeyManager {
    pub fn new() -> Self { Self::default() }

    /// Manager preloaded with an existing keypair
    pub fn with_keypair(keypair: Keypair) -> Self {
        let keys = Self::new();
        keys.load(keypair);
        keys
    }

    /// Generate a fresh keypair and make it the active one.
    pub fn generate_keypair(&self) -> ClientResult<Keypair> {
        let mut bytes = [0u8; 32];
        // Out-of-range scalars are astronomically rare; retry a few times anyway.
        for _ in 0..4 {
            rand::rngs::OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| ClientError::KeyGeneration(e.to_string()))?;
            if let Ok(keypair) = Keypair::from_private_key(bytes) {
                bytes.zeroize();
                tracing::debug!(address = %keypair.address(), "generated keypair");
                self.load(keypair.clone());
                return Ok(keypair);
            }
        }
        bytes.zeroize();
        Err(ClientError::KeyGeneration("no valid secret key produced".into()))
    }

    pub fn load(&self, keypair: Keypair) {
        *lock(&self.slot) = Some(keypair);
    }

    pub fn keypair(&self) -> Option<Keypair> { lock(&self.slot).clone() }

    pub fn address(&self) -> Option<String> {
        lock(&self.slot).as_ref().map(|k| k.address.clone())
    }

    pub fn has_key(&self) -> bool { lock(&self.slot).is_some() }

    /// Signer bound to this manager's slot.
    pub fn signer(&self) -> ClientResult<LocalSigner> {
        if !self.has_key() {
            return Err(ClientError::NoKey);
        }
        Ok(LocalSigner::new(self.clone()))
    }

    /// Forget the active key. Dropping the keypair zeroizes it.
    pub fn clear(&self) {
        if let Some(mut keypair) = lock(&self.slot).take() {
            keypair.zeroize();
        }
    }

    pub(crate) fn with_keypair_ref<R>(&self, f: impl FnOnce(&Keypair) -> R) -> ClientResult<R> {
        lock(&self.slot).as_ref().map(f).ok_or(ClientError::NoKey)
    }
}
