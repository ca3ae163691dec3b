use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::BackendError;
use crate::config::BackendConfig;

/// Fields the backend services use for their error text, in order of preference.
const ERROR_MESSAGE_FIELDS: [&str; 4] = ["msg", "error_description", "message", "error"];

/// Shared HTTP plumbing: base URL, timeouts and the headers every call needs.
pub struct BackendHttp {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl BackendHttp {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()?;
        Ok(BackendHttp {
            client,
            base_url: config.base_url().to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Every request carries the project key; the bearer is the user's
    /// access token when there is one, the anon key otherwise.
    pub fn request(&self, method: Method, path: &str, access_token: Option<&str>) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }
}

/// Decode a successful JSON body, or turn an error status into `BackendError::Api`.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| BackendError::Decode(format!("status {}: {}", status.as_u16(), e)))
}

pub fn api_error(status: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ERROR_MESSAGE_FIELDS
                .iter()
                .find_map(|field| json.get(*field).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty() {
                format!("Request failed with status {}", status)
            } else {
                text.to_string()
            }
        });
    BackendError::Api { status, message }
}
