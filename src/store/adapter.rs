use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::reduction::{Reduction, SESSION_REDUCTIONS};
use super::{PhysicalStore, StoreError};

/// The key-value contract the auth client persists its session through.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Read failures are logged and reported as "nothing stored".
    async fn get_item(&self, key: &str) -> Option<String>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// Percent-encode a key so every physical store sees only unreserved characters.
///
/// ASCII letters, digits and `-` `_` `.` `~` pass through; every other byte of
/// the UTF-8 key becomes `%XX` with uppercase hex. That includes `!` `'` `(`
/// `)` `*`, so `a!b` is stored as `a%21b`.
pub fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

/// Storage adapter in front of the physical store selected at startup.
///
/// Unbounded stores receive values verbatim. For size-limited stores a
/// session payload (JSON with a `user` field) is written through the
/// reduction chain: each projection replaces `user` in turn and the first
/// candidate that fits wins. Token fields are never touched.
pub struct SessionStorage {
    store: Arc<dyn PhysicalStore>,
    reductions: Vec<Reduction>,
}

impl SessionStorage {
    pub fn new(store: Arc<dyn PhysicalStore>) -> Self {
        Self::with_reductions(store, SESSION_REDUCTIONS.to_vec())
    }

    pub fn with_reductions(store: Arc<dyn PhysicalStore>, reductions: Vec<Reduction>) -> Self {
        SessionStorage { store, reductions }
    }

    pub fn store(&self) -> &Arc<dyn PhysicalStore> {
        &self.store
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.store.capacity().is_none() {
            return self.store.set(key, value).await;
        }

        let mut payload: Value = serde_json::from_str(value)?;
        let user = match payload.get("user") {
            Some(user) if !user.is_null() => user.clone(),
            _ => return self.store.set(key, value).await,
        };

        let mut last_error = None;
        for (attempt, reduce) in self.reductions.iter().enumerate() {
            payload["user"] = reduce(&user);
            let candidate = serde_json::to_string(&payload)?;
            match self.store.set(key, &candidate).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(
                            event_name = "storage.session.reduced",
                            event_domain = "storage",
                            store = self.store.get_name(),
                            attempt,
                            bytes = candidate.len(),
                            "session stored with a reduced user record"
                        );
                    }
                    return Ok(());
                }
                Err(e) if e.is_capacity_exceeded() => {
                    debug!(attempt, error = %e, "reduced session still too large");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => self.store.set(key, value).await,
        }
    }
}

#[async_trait]
impl StorageAdapter for SessionStorage {
    async fn get_item(&self, key: &str) -> Option<String> {
        let key = encode_key(key);
        match self.store.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(store = self.store.get_name(), key = %key, "Storage getItem error: {}", e);
                None
            }
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = encode_key(key);
        self.write(&key, value).await.map_err(|e| {
            warn!(store = self.store.get_name(), key = %key, "Storage setItem error: {}", e);
            e
        })
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let key = encode_key(key);
        self.store.remove(&key).await.map_err(|e| {
            warn!(store = self.store.get_name(), key = %key, "Storage removeItem error: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory_store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    /// Wraps a MemoryStore, recording every key and value it is asked to write.
    struct RecordingStore {
        inner: MemoryStore,
        writes: Mutex<Vec<(String, String)>>,
        fail_reads: bool,
        fail_writes: bool,
        fail_removes: bool,
    }

    impl RecordingStore {
        fn new(inner: MemoryStore) -> Self {
            RecordingStore {
                inner,
                writes: Mutex::new(Vec::new()),
                fail_reads: false,
                fail_writes: false,
                fail_removes: false,
            }
        }

        fn writes(&self) -> Vec<(String, String)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PhysicalStore for RecordingStore {
        fn get_name(&self) -> &str {
            "recording"
        }

        fn capacity(&self) -> Option<usize> {
            self.inner.capacity()
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Io(std::io::Error::other("disk gone")));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.writes
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
            if self.fail_writes {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_removes {
                return Err(StoreError::Io(std::io::Error::other("read-only")));
            }
            self.inner.remove(key).await
        }
    }

    fn session_with(user_metadata: Value, access_token: &str) -> Value {
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "refresh_token": "refresh-token",
            "user": {
                "id": "user-1",
                "email": "someone@example.com",
                "aud": "authenticated",
                "user_metadata": user_metadata
            }
        })
    }

    fn bounded(limit: usize) -> (Arc<RecordingStore>, SessionStorage) {
        let store = Arc::new(RecordingStore::new(MemoryStore::with_capacity(limit)));
        let storage = SessionStorage::new(store.clone());
        (store, storage)
    }

    #[tokio::test]
    async fn test_unbounded_store_round_trips_verbatim() {
        let store = Arc::new(MemoryStore::new());
        let storage = SessionStorage::new(store);
        let value = session_with(json!({"name": "Ana", "bio": "x".repeat(5000)}), "token")
            .to_string();

        storage.set_item("sb-ref-auth-token", &value).await.unwrap();
        let stored = storage.get_item("sb-ref-auth-token").await.unwrap();

        assert_eq!(stored, value);
    }

    #[tokio::test]
    async fn test_bounded_store_keeps_minimal_user_when_it_fits() {
        let (_store, storage) = bounded(2048);
        let session = session_with(
            json!({
                "name": "Ana",
                "is_landlord": true,
                "company_name": "Lets",
                "bio": "x".repeat(4000)
            }),
            "token",
        );

        storage.set_item("session", &session.to_string()).await.unwrap();
        let stored: Value = serde_json::from_str(&storage.get_item("session").await.unwrap()).unwrap();

        assert_eq!(
            stored["user"],
            json!({
                "id": "user-1",
                "email": "someone@example.com",
                "user_metadata": {"name": "Ana", "is_landlord": true, "company_name": "Lets"}
            })
        );
        assert_eq!(stored["access_token"], session["access_token"]);
        assert_eq!(stored["refresh_token"], session["refresh_token"]);
        assert_eq!(stored["expires_at"], session["expires_at"]);
    }

    #[tokio::test]
    async fn test_null_metadata_never_stored() {
        let (_store, storage) = bounded(2048);
        let session = session_with(
            json!({"name": null, "is_landlord": false, "company_name": null}),
            "token",
        );

        storage.set_item("session", &session.to_string()).await.unwrap();
        let stored: Value = serde_json::from_str(&storage.get_item("session").await.unwrap()).unwrap();

        assert_eq!(stored["user"]["user_metadata"], json!({"is_landlord": false}));
    }

    #[tokio::test]
    async fn test_falls_back_to_landlord_flag_when_minimal_is_too_large() {
        let (store, storage) = bounded(2048);
        let session = session_with(json!({"name": "n".repeat(3000), "is_landlord": true}), "token");

        storage.set_item("session", &session.to_string()).await.unwrap();
        let stored: Value = serde_json::from_str(&storage.get_item("session").await.unwrap()).unwrap();

        assert_eq!(
            stored["user"],
            json!({"id": "user-1", "user_metadata": {"is_landlord": true}})
        );
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_reductions_propagate_capacity_error() {
        let (store, storage) = bounded(2048);
        let session = session_with(json!({"is_landlord": false}), &"t".repeat(3000));

        let err = storage
            .set_item("session", &session.to_string())
            .await
            .unwrap_err();

        assert!(err.is_capacity_exceeded());
        assert_eq!(store.writes().len(), 2, "exactly one retry after the first attempt");
        assert_eq!(storage.get_item("session").await, None);
    }

    #[tokio::test]
    async fn test_other_write_errors_are_not_retried() {
        let mut recording = RecordingStore::new(MemoryStore::with_capacity(2048));
        recording.fail_writes = true;
        let store = Arc::new(recording);
        let storage = SessionStorage::new(store.clone());
        let session = session_with(json!({"is_landlord": true}), "token");

        let err = storage
            .set_item("session", &session.to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_non_session_payload_written_verbatim_on_bounded_store() {
        let (store, storage) = bounded(2048);
        let value = json!({"code_verifier": "abc"}).to_string();

        storage.set_item("verifier", &value).await.unwrap();

        assert_eq!(store.writes(), vec![("verifier".to_string(), value)]);
    }

    #[tokio::test]
    async fn test_invalid_json_on_bounded_store_is_an_error() {
        let (store, storage) = bounded(2048);
        let err = storage.set_item("k", "not json").await.unwrap_err();

        assert!(matches!(err, StoreError::Serialization(_)));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_percent_encoded() {
        let (store, storage) = bounded(2048);

        storage.set_item("sb:project/auth token", "{}").await.unwrap();
        assert_eq!(
            storage.get_item("sb:project/auth token").await,
            Some("{}".to_string())
        );
        storage.remove_item("sb:project/auth token").await.unwrap();

        assert_eq!(store.writes()[0].0, "sb%3Aproject%2Fauth%20token");
        assert_eq!(encode_key("plain-key_1.~"), "plain-key_1.~");
    }

    #[test]
    fn test_sub_delimiters_are_escaped() {
        assert_eq!(encode_key("a!b'(c)*"), "a%21b%27%28c%29%2A");
        assert_eq!(encode_key("clé"), "cl%C3%A9");
    }

    #[tokio::test]
    async fn test_remove_failures_propagate() {
        let mut recording = RecordingStore::new(MemoryStore::new());
        recording.fail_removes = true;
        let storage = SessionStorage::new(Arc::new(recording));

        let err = storage.remove_item("session").await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_read_failures_degrade_to_none() {
        let mut recording = RecordingStore::new(MemoryStore::new());
        recording.fail_reads = true;
        let storage = SessionStorage::new(Arc::new(recording));

        assert_eq!(storage.get_item("session").await, None);
    }
}
