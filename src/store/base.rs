use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::{local_store::LocalStore, memory_store::MemoryStore, secure_store::SecureStore};
use crate::config::{PlatformChoice, StorageConfig};

/// Failures reported by a physical store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The value does not fit the store's per-entry ceiling.
    #[error("value of {size} bytes is larger than {limit} bytes")]
    CapacityExceeded { size: usize, limit: usize },
    #[error("invalid store key '{0}'")]
    InvalidKey(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encryption error: {0}")]
    Crypto(String),
    #[error("invalid JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, StoreError::CapacityExceeded { .. })
    }
}

/// The PhysicalStore trait abstracts the key-value store the session ends up in.
///
/// Keys arrive already encoded; a store never sees a raw key.
#[async_trait]
pub trait PhysicalStore: Send + Sync {
    fn get_name(&self) -> &str;

    /// Per-entry size ceiling in bytes, `None` when values are unbounded.
    fn capacity(&self) -> Option<usize> {
        None
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// The runtime platform, which decides the physical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Browser builds: unencrypted local storage.
    Web,
    /// Device builds: encrypted, size-limited secure storage.
    Native,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else {
            Platform::Native
        }
    }

    pub fn resolve(choice: PlatformChoice) -> Self {
        match choice {
            PlatformChoice::Auto => Platform::detect(),
            PlatformChoice::Web => Platform::Web,
            PlatformChoice::Native => Platform::Native,
        }
    }
}

/// Creates the physical store once at startup.
/// `ephemeral = true` returns a MemoryStore; otherwise the platform picks the backend.
pub async fn create_store(config: &StorageConfig) -> Result<Arc<dyn PhysicalStore>, StoreError> {
    if config.ephemeral {
        info!("Session storage is ephemeral. Using MemoryStore.");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let platform = Platform::resolve(config.platform);
    match platform {
        Platform::Web => {
            info!(path = %config.local.path.display(), "Using local store for sessions.");
            Ok(Arc::new(LocalStore::new(&config.local)))
        }
        Platform::Native => {
            let store = SecureStore::new(&config.secure)?;
            store.prepare().await?;
            info!(
                path = %config.secure.path.display(),
                capacity_bytes = config.secure.capacity_bytes,
                "Using secure store for sessions."
            );
            Ok(Arc::new(store))
        }
    }
}
