//! File-backed keypair persistence for the CLI.
//!
//! The key is stored as plain hex in `{root}/{app}/data/keypair.json`.
//! Root is `BEELINK_ROOT` if set, else the platform local data dir.

use super::Keypair;
use crate::error::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyFile {
    public_key: String,
    private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn for_app(app: &str) -> Self {
        let root = std::env::var("BEELINK_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
        Self { path: root.join(app).join("data").join("keypair.json") }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn exists(&self) -> bool { self.path.exists() }

    /// Load the stored keypair, backfilling the address if the file predates it.
    pub fn load(&self) -> ClientResult<Option<Keypair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| ClientError::Io(format!("keypair read: {e}")))?;
        let mut file: KeyFile = serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("keypair json: {e}")))?;
        let keypair = Keypair::from_parts(&file.public_key, &file.private_key, file.address.as_deref());
        file.private_key.zeroize();
        keypair.map(Some)
    }

    pub fn save(&self, keypair: &Keypair) -> ClientResult<()> {
        let mut file = KeyFile {
            public_key: keypair.public_key_hex(),
            private_key: keypair.private_key_hex(),
            address: Some(keypair.address().to_string()),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Io(format!("keypair mkdir: {e}")))?;
        }
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ClientError::Config(format!("keypair json: {e}")));
        file.private_key.zeroize();
        let mut json = json?;
        let written = std::fs::write(&self.path, &json)
            .map_err(|e| ClientError::Io(format!("keypair write: {e}")));
        json.zeroize();
        written
    }

    pub fn delete(&self) -> ClientResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .map_err(|e| ClientError::Io(format!("keypair delete: {e}")))?;
        }
        Ok(())
    }
}
