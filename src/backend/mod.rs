pub mod auth_client;
pub mod error;
pub mod http;
pub mod object_storage;
pub mod rest;

use std::sync::Arc;

use tracing::info;

pub use auth_client::{AuthClient, SignUpResponse};
pub use error::BackendError;
pub use object_storage::{Bucket, FileOptions, StorageClient, UploadedObject};
pub use rest::ProfilesTable;

use crate::config::{AuthOptions, BackendConfig};
use crate::store::StorageAdapter;
use self::http::BackendHttp;

/// The hosted backend: auth, object storage and the profiles table,
/// all sharing one HTTP client.
pub struct Backend {
    http: Arc<BackendHttp>,
    auth: Arc<AuthClient>,
}

impl Backend {
    pub fn new(
        config: &BackendConfig,
        options: AuthOptions,
        storage: Arc<dyn StorageAdapter>,
    ) -> Result<Self, BackendError> {
        let http = Arc::new(BackendHttp::new(config)?);
        let project_ref = config.project_ref();
        info!(
            "Creating backend client for project '{}' at {}",
            project_ref,
            http.base_url()
        );
        let auth = Arc::new(AuthClient::new(http.clone(), &project_ref, options, storage));
        Ok(Backend { http, auth })
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// A shared handle to the auth client, for long-lived subscribers.
    pub fn auth_handle(&self) -> Arc<AuthClient> {
        self.auth.clone()
    }

    pub fn storage(&self) -> StorageClient<'_> {
        StorageClient::new(&self.http)
    }

    /// The profiles table, called as the signed-in user when there is one.
    pub async fn profiles(&self) -> ProfilesTable<'_> {
        ProfilesTable::new(&self.http, self.auth.access_token().await)
    }
}
