//! Node configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML or
//! TOML file, `KRISHISETU__SECTION__KEY` environment variables, then the
//! conventional `SUPABASE_URL` / `SUPABASE_ANON_KEY` pair. The binary
//! applies its command line flags on top.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_PREFIX: &str = "KRISHISETU";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub api: ApiConfig,
    pub storage: StorageSettings,
    pub ledger: LedgerConfig,
    pub qr: QrConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process tables; nothing survives a restart
    #[default]
    Memory,
    /// Hosted Postgres behind its PostgREST interface
    Postgrest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    /// Anonymous API key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: None,
            api_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Serve from the simulated chain when the store fails
    pub fallback_enabled: bool,
    /// Shown for products registered without a farm location
    pub default_farm_location: String,
    /// Maximum number of search results
    pub search_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            default_farm_location: "Odisha Farm".to_string(),
            search_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// External QR image endpoint
    pub endpoint: String,
    /// Edge length of the square image in pixels
    pub size: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.qrserver.com/v1/create-qr-code/".to_string(),
            size: 150,
        }
    }
}

impl NodeConfig {
    /// Loads the configuration from `path` (if any) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut node_config: NodeConfig = builder.build()?.try_deserialize()?;
        node_config.apply_supabase_env(|key| std::env::var(key).ok());
        Ok(node_config)
    }

    /// A configured `SUPABASE_URL` switches storage to the hosted backend
    /// unless a URL was already set explicitly.
    pub fn apply_supabase_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.storage.url.is_none() {
            if let Some(url) = lookup("SUPABASE_URL").filter(|v| !v.is_empty()) {
                self.storage.url = Some(url);
                self.storage.backend = StorageBackend::Postgrest;
            }
        }
        if self.storage.api_key.is_none() {
            self.storage.api_key = lookup("SUPABASE_ANON_KEY").filter(|v| !v.is_empty());
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
