//! Global configuration types for Parley.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! daily quota, the chat client (typing delay, storage backend, server URL),
//! and the HTTP server bind settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::quota::DEFAULT_DAILY_LIMIT;

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Server-side usage quota settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Turns per client identity per calendar day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Seconds between background normalization passes over the ledger.
    /// Zero disables the sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_daily_limit() -> u32 {
    DEFAULT_DAILY_LIMIT
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl QuotaConfig {
    /// The configured limit, never below one.
    pub fn effective_limit(&self) -> u32 {
        self.daily_limit.max(1)
    }
}

/// Backend used by the client for persisting conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Sqlite,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::File
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!("invalid storage backend: '{other}'")),
        }
    }
}

/// Client-side chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Simulated "typing" latency before a reply is appended.
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,

    /// Fixed seed for reply selection. `None` seeds from entropy.
    #[serde(default)]
    pub reply_seed: Option<u64>,

    #[serde(default)]
    pub storage: StorageBackend,

    /// Base URL of the quota server consulted by `parley chat`.
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

fn default_typing_delay_ms() -> u64 {
    1200
}

fn default_server_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_delay_ms: default_typing_delay_ms(),
            reply_seed: None,
            storage: StorageBackend::default(),
            server_url: default_server_url(),
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for public attachment URLs. Defaults to `http://{host}:{port}`.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Use the first `X-Forwarded-For` hop as client identity.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
            trust_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    /// Base URL under which uploads are published.
    pub fn base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.quota.daily_limit, 10);
        assert_eq!(config.chat.typing_delay_ms, 1200);
        assert_eq!(config.chat.storage, StorageBackend::File);
        assert_eq!(config.server.port, 3000);
        assert!(!config.server.trust_forwarded_for);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: GlobalConfig = toml::from_str(
            r#"
[quota]
daily_limit = 25

[chat]
storage = "sqlite"
reply_seed = 7
"#,
        )
        .unwrap();
        assert_eq!(config.quota.daily_limit, 25);
        assert_eq!(config.quota.sweep_interval_secs, 3600);
        assert_eq!(config.chat.storage, StorageBackend::Sqlite);
        assert_eq!(config.chat.reply_seed, Some(7));
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_effective_limit_floor() {
        let quota = QuotaConfig {
            daily_limit: 0,
            sweep_interval_secs: 0,
        };
        assert_eq!(quota.effective_limit(), 1);
    }

    #[test]
    fn test_base_url_prefers_explicit() {
        let mut server = ServerConfig::default();
        assert_eq!(server.base_url(), "http://127.0.0.1:3000");
        server.public_base_url = Some("https://chat.example.com".to_string());
        assert_eq!(server.base_url(), "https://chat.example.com");
    }
}
