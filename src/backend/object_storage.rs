use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use super::error::BackendError;
use super::http::{read_json, BackendHttp};

/// Upload options for a single object.
#[derive(Debug, Clone)]
pub struct FileOptions {
    pub content_type: String,
    /// Seconds, sent as `cache-control: max-age=N`.
    pub cache_control: u32,
    /// Replace an existing object instead of failing.
    pub upsert: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        FileOptions {
            content_type: "application/octet-stream".to_string(),
            cache_control: 3600,
            upsert: false,
        }
    }
}

/// The backend's answer to an upload.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UploadedObject {
    #[serde(rename = "Key")]
    pub key: String,
}

/// Entry point to the object storage API.
pub struct StorageClient<'a> {
    http: &'a BackendHttp,
}

impl<'a> StorageClient<'a> {
    pub fn new(http: &'a BackendHttp) -> Self {
        StorageClient { http }
    }

    pub fn from(&self, bucket: &str) -> Bucket<'a> {
        Bucket {
            http: self.http,
            name: bucket.to_string(),
        }
    }
}

/// A single bucket.
pub struct Bucket<'a> {
    http: &'a BackendHttp,
    name: String,
}

impl Bucket<'_> {
    pub async fn upload(
        &self,
        object: &str,
        bytes: Vec<u8>,
        options: &FileOptions,
    ) -> Result<UploadedObject, BackendError> {
        let size = bytes.len();
        let response = self
            .http
            .request(Method::POST, &self.object_path(object), None)
            .header("content-type", &options.content_type)
            .header("cache-control", format!("max-age={}", options.cache_control))
            .header("x-upsert", options.upsert.to_string())
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadedObject = read_json(response).await?;
        info!(
            event_name = "storage.object.uploaded",
            event_domain = "storage",
            bucket = self.name.as_str(),
            object,
            bytes = size,
            "object uploaded"
        );
        Ok(uploaded)
    }

    /// The public URL of an object. Only meaningful for public buckets; no request is made.
    pub fn get_public_url(&self, object: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.http.base_url(),
            self.name,
            object
        )
    }

    fn object_path(&self, object: &str) -> String {
        format!("/storage/v1/object/{}/{}", self.name, object)
    }
}
