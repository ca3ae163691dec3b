#![allow(dead_code)]

use std::path::Path;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use nestkey::config::{Config, ConfigV1};
use nestkey::startup::build_state;
use nestkey::state::AppState;
use serde_json::{json, Value};

/// 32 bytes, base64.
pub const TEST_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

pub fn parse_config(yaml: &str) -> ConfigV1 {
    let config: Config = Figment::new()
        .merge(Yaml::string(yaml))
        .extract()
        .expect("test config should parse");
    match config {
        Config::ConfigV1(config) => config,
    }
}

/// Sessions kept in memory only, talking to `backend_url`.
pub fn ephemeral_config(backend_url: &str) -> ConfigV1 {
    parse_config(&format!(
        r#"
version: "1.0.0"
logging:
  level: "debug"
  format: "json"
backend:
  url: "{backend_url}"
  anon_key: "test-anon-key"
  timeout_in_ms: 3000
storage:
  ephemeral: true
"#
    ))
}

/// Sessions in an encrypted, 2048-byte-per-entry store under `dir`.
pub fn secure_config(backend_url: &str, dir: &Path) -> ConfigV1 {
    parse_config(&format!(
        r#"
version: "1.0.0"
backend:
  url: "{backend_url}"
  anon_key: "test-anon-key"
storage:
  platform: native
  secure:
    path: "{path}"
    key: "{TEST_KEY}"
    capacity_bytes: 2048
"#,
        path = dir.join("secure").display()
    ))
}

/// Sessions in a plain JSON file under `dir`.
pub fn local_config(backend_url: &str, dir: &Path) -> ConfigV1 {
    parse_config(&format!(
        r#"
version: "1.0.0"
backend:
  url: "{backend_url}"
  anon_key: "test-anon-key"
storage:
  platform: web
  local:
    path: "{path}"
"#,
        path = dir.join("sessions.json").display()
    ))
}

pub async fn build_app(config: ConfigV1) -> AppState {
    build_state(config).await.expect("app state should build")
}

/// A token response as the auth API returns it.
pub fn session_response(access_token: &str, user_metadata: Value) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": format!("refresh-{access_token}"),
        "user": {
            "id": "user-1",
            "aud": "authenticated",
            "role": "authenticated",
            "email": "someone@example.com",
            "app_metadata": {"provider": "email", "providers": ["email"]},
            "user_metadata": user_metadata,
            "identities": [],
            "created_at": "2024-05-01T10:00:00Z"
        }
    })
}
