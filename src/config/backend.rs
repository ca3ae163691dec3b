use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the hosted backend lives and the public key used for anonymous calls.
/// Both fall back to a local development stack when nothing is configured.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct BackendConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_anon_key")]
    pub anon_key: String,
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

fn default_url() -> String {
    "http://localhost.localdomain:54321".to_string()
}

fn default_anon_key() -> String {
    "local-development-anon-key".to_string()
}

fn default_timeout_in_ms() -> u64 {
    10_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            url: default_url(),
            anon_key: default_anon_key(),
            timeout_in_ms: default_timeout_in_ms(),
        }
    }
}

impl BackendConfig {
    /// The project reference is the first label of the backend host,
    /// e.g. `abcdefgh` for `https://abcdefgh.example.co`.
    pub fn project_ref(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(|host| host.to_string()))
            .and_then(|host| host.split('.').next().map(str::to_string))
            .unwrap_or_else(|| "local".to_string())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Options handed to the auth client.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct AuthOptions {
    #[serde(default = "enabled")]
    pub persist_session: bool,
    #[serde(default = "enabled")]
    pub auto_refresh_token: bool,
    /// Accepted for parity with browser clients. This client never sees a
    /// redirect URL, so setting it only logs a warning when the client starts.
    #[serde(default)]
    pub detect_session_in_url: bool,
}

fn enabled() -> bool {
    true
}

impl Default for AuthOptions {
    fn default() -> Self {
        AuthOptions {
            persist_session: true,
            auto_refresh_token: true,
            detect_session_in_url: false,
        }
    }
}
