use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::local_store::LocalStoreConfig;
use crate::store::secure_store::SecureStoreConfig;

/// Which physical store backs the session storage:
/// - auto: detect the platform once at startup.
/// - web / native: force the browser-style or device-style store.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlatformChoice {
    #[default]
    Auto,
    Web,
    Native,
}

/// A wrapper for the storage configuration:
/// - ephemeral: keep sessions in memory only (MemoryStore), ignoring the platform.
/// - local / secure: settings for the two persistent stores.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct StorageConfig {
    #[serde(default)]
    pub platform: PlatformChoice,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub local: LocalStoreConfig,
    #[serde(default)]
    pub secure: SecureStoreConfig,
}
