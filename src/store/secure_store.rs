use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PhysicalStore, StoreError};

/// Per-entry ceiling of device secure storage.
pub const DEFAULT_CAPACITY_BYTES: usize = 2048;

const NONCE_LEN: usize = 12;

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The config struct for the encrypted store.
/// `key` is a base64-encoded 32-byte AES key; without it the store cannot open.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct SecureStoreConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity_bytes: usize,
}

fn default_path() -> PathBuf {
    PathBuf::from("./secure-store")
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY_BYTES
}

impl Default for SecureStoreConfig {
    fn default() -> Self {
        SecureStoreConfig {
            path: default_path(),
            key: None,
            capacity_bytes: default_capacity(),
        }
    }
}

/// Persistent, encrypted store with a fixed per-entry capacity.
///
/// Each entry is its own file under `path`, containing
/// base64(`nonce || AES-256-GCM ciphertext`). The capacity applies to the
/// plaintext value and is checked before anything touches disk.
pub struct SecureStore {
    dir: PathBuf,
    cipher: Aes256Gcm,
    capacity: usize,
}

impl SecureStore {
    pub fn new(config: &SecureStoreConfig) -> Result<Self, StoreError> {
        let encoded = config.key.as_deref().ok_or_else(|| {
            StoreError::Crypto("no encryption key configured for the secure store".to_string())
        })?;
        let key = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| StoreError::Crypto(format!("encryption key is not valid base64: {}", e)))?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| {
            StoreError::Crypto(format!("encryption key must be 32 bytes, got {}", key.len()))
        })?;

        Ok(SecureStore {
            dir: config.path.clone(),
            cipher,
            capacity: config.capacity_bytes,
        })
    }

    /// Create the entry directory if needed.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Keys become file names, so only the percent-encoded alphabet is
    /// accepted. A leading dot is reserved for temporary files.
    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '~' | '%'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    /// A sibling no entry can be named after, unique per write.
    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq))
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| StoreError::Crypto(format!("failed to encrypt entry: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    fn open(&self, sealed: &str) -> Result<String, StoreError> {
        let bytes = general_purpose::STANDARD
            .decode(sealed.trim())
            .map_err(|e| StoreError::Crypto(format!("entry is not valid base64: {}", e)))?;
        if bytes.len() < NONCE_LEN {
            return Err(StoreError::Crypto("entry is truncated".to_string()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::Crypto("failed to decrypt entry".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|e| StoreError::Crypto(format!("decrypted entry is not UTF-8: {}", e)))
    }
}

#[async_trait]
impl PhysicalStore for SecureStore {
    fn get_name(&self) -> &str {
        "secure"
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(sealed) => self.open(&sealed).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        if value.len() > self.capacity {
            return Err(StoreError::CapacityExceeded {
                size: value.len(),
                limit: self.capacity,
            });
        }

        let sealed = self.seal(value.as_bytes())?;
        let tmp = self.temp_path(key);
        tokio::fs::write(&tmp, sealed).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(key, bytes = value.len(), "secure store entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
