use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{PhysicalStore, StoreError};

/// An in-process store. Nothing survives a restart.
///
/// An optional capacity makes it behave like a size-limited device store.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
            capacity: Some(limit),
        }
    }

    /// All keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhysicalStore for MemoryStore {
    fn get_name(&self) -> &str {
        "memory"
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.capacity {
            if value.len() > limit {
                return Err(StoreError::CapacityExceeded {
                    size: value.len(),
                    limit,
                });
            }
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
