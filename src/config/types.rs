use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::backend::{AuthOptions, BackendConfig};
use super::logging::LoggingConfig;
use super::store::StorageConfig;

/// Environment variables that point the client at a backend project.
const BACKEND_URL_VAR: &str = "SUPABASE_URL";
const BACKEND_ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0. Every section has defaults, so an empty file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthOptions,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Layers, lowest precedence first: built-in version tag, the YAML file,
/// `NESTKEY_`-prefixed variables (`__` separates nested keys), and finally
/// the two backend variables.
pub fn config_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::default("version", "1.0.0"))
        .merge(Yaml::file(path))
        .merge(Env::prefixed("NESTKEY_").split("__"))
        .merge(
            Env::raw()
                .only(&[BACKEND_URL_VAR, BACKEND_ANON_KEY_VAR])
                .map(|key| {
                    if key.as_str().eq_ignore_ascii_case(BACKEND_URL_VAR) {
                        "backend.url".into()
                    } else {
                        "backend.anon_key".into()
                    }
                }),
        )
}

/// Extract a `ConfigV1` from any figment; used directly by tests.
pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from the given YAML file (missing files fall back to defaults).
pub fn load_config(path: &Path) -> ConfigV1 {
    match extract_config(&config_figment(path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
