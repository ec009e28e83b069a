//! Client-side wiring for `parley chat` and `parley session`.
//!
//! The turn engine is generic over its storage and quota ports. The CLI picks
//! implementations at runtime (file or SQLite history, local or remote quota,
//! on-disk or in-memory uploads), so each port is pinned to a small enum that
//! forwards to the chosen implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use parley_core::conversation::store::{ConversationStore, SessionSeed};
use parley_core::persona::PERSONAS;
use parley_core::quota::gate::QuotaGate;
use parley_core::quota::service::QuotaService;
use parley_core::storage::kv_store::KvStore;
use parley_core::storage::memory::{MemoryKvStore, MemoryObjectStore};
use parley_core::storage::object_store::ObjectStore;
use parley_core::turn::engine::{TurnEngine, TurnEngineConfig};
use parley_infra::filesystem::{conversations_dir, database_url, ensure_layout, uploads_dir};
use parley_infra::quota::http_client::HttpQuotaGate;
use parley_infra::sqlite::kv::SqliteKvStore;
use parley_infra::storage::json_file::JsonFileKvStore;
use parley_infra::storage::local_objects::LocalObjectStore;
use parley_types::config::{GlobalConfig, StorageBackend};
use parley_types::error::{QuotaError, RepositoryError, UploadError};
use parley_types::quota::UsageSnapshot;

/// Conversation persistence chosen at startup.
pub enum ClientKv {
    File(JsonFileKvStore),
    Sqlite(SqliteKvStore),
    Memory(MemoryKvStore),
}

impl KvStore for ClientKv {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
        match self {
            ClientKv::File(kv) => kv.get(key).await,
            ClientKv::Sqlite(kv) => kv.get(key).await,
            ClientKv::Memory(kv) => kv.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
        match self {
            ClientKv::File(kv) => kv.set(key, value).await,
            ClientKv::Sqlite(kv) => kv.set(key, value).await,
            ClientKv::Memory(kv) => kv.set(key, value).await,
        }
    }
}

/// Attachment storage chosen at startup.
pub enum ClientObjects {
    Local(LocalObjectStore),
    Memory(MemoryObjectStore),
}

impl ObjectStore for ClientObjects {
    async fn upload(&self, name: &str, data: &[u8]) -> Result<String, UploadError> {
        match self {
            ClientObjects::Local(store) => store.upload(name, data).await,
            ClientObjects::Memory(store) => store.upload(name, data).await,
        }
    }

    fn public_url(&self, storage_key: &str) -> String {
        match self {
            ClientObjects::Local(store) => store.public_url(storage_key),
            ClientObjects::Memory(store) => store.public_url(storage_key),
        }
    }
}

/// Quota gate chosen at startup.
pub enum ClientQuota {
    /// In-process ledger; resets with the process.
    Local(QuotaService),
    /// A running `parley serve`.
    Remote(HttpQuotaGate),
}

impl QuotaGate for ClientQuota {
    async fn try_consume(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
        match self {
            ClientQuota::Local(service) => QuotaGate::try_consume(service, client_id).await,
            ClientQuota::Remote(gate) => gate.try_consume(client_id).await,
        }
    }

    async fn peek(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
        match self {
            ClientQuota::Local(service) => QuotaGate::peek(service, client_id).await,
            ClientQuota::Remote(gate) => gate.peek(client_id).await,
        }
    }

    async fn refund(&self, client_id: &str) -> Result<(), QuotaError> {
        match self {
            ClientQuota::Local(service) => QuotaGate::refund(service, client_id).await,
            ClientQuota::Remote(gate) => gate.refund(client_id).await,
        }
    }
}

/// Turn engine pinned to the client port enums.
pub type ChatEngine = TurnEngine<ClientKv, ClientObjects, ClientQuota>;

/// Flags that select client port implementations.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Quota server URL; overrides `chat.server_url`.
    pub server: Option<String>,
    /// Gate turns with an in-process quota service.
    pub local: bool,
    /// Keep history and uploads in memory only.
    pub ephemeral: bool,
}

impl ClientOptions {
    pub fn server_url<'a>(&'a self, config: &'a GlobalConfig) -> &'a str {
        self.server.as_deref().unwrap_or(&config.chat.server_url)
    }

    /// Short description for the welcome banner.
    pub fn mode_label(&self, config: &GlobalConfig) -> String {
        let quota = if self.local {
            "local quota".to_string()
        } else {
            format!("quota via {}", self.server_url(config))
        };
        let storage = if self.ephemeral {
            "in-memory history".to_string()
        } else {
            format!("{} history", config.chat.storage)
        };
        format!("{quota}, {storage}")
    }
}

/// Open the configured conversation persistence.
pub async fn open_kv(
    data_dir: &Path,
    config: &GlobalConfig,
    ephemeral: bool,
) -> anyhow::Result<ClientKv> {
    if ephemeral {
        return Ok(ClientKv::Memory(MemoryKvStore::new()));
    }

    ensure_layout(data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let kv = match config.chat.storage {
        StorageBackend::File => ClientKv::File(JsonFileKvStore::new(conversations_dir(data_dir))),
        StorageBackend::Sqlite => {
            let url = database_url(data_dir);
            let kv = SqliteKvStore::open(&url)
                .await
                .with_context(|| format!("Failed to open {url}"))?;
            ClientKv::Sqlite(kv)
        }
    };
    Ok(kv)
}

/// Load the conversation store on the configured persistence.
pub async fn open_store(
    data_dir: &Path,
    config: &GlobalConfig,
    ephemeral: bool,
) -> anyhow::Result<ConversationStore<ClientKv>> {
    let kv = open_kv(data_dir, config, ephemeral).await?;
    Ok(ConversationStore::load(kv, SessionSeed::default()).await)
}

/// Wire a turn engine for an interactive session.
pub async fn build_engine(
    data_dir: &Path,
    config: &GlobalConfig,
    options: &ClientOptions,
) -> anyhow::Result<ChatEngine> {
    let store = open_store(data_dir, config, options.ephemeral).await?;

    let objects = if options.ephemeral {
        ClientObjects::Memory(MemoryObjectStore::new())
    } else {
        let base_url = format!("{}/uploads", config.server.base_url());
        ClientObjects::Local(LocalObjectStore::new(uploads_dir(data_dir), base_url))
    };

    let quota = if options.local {
        ClientQuota::Local(QuotaService::with_limit(config.quota.effective_limit()))
    } else {
        ClientQuota::Remote(HttpQuotaGate::new(options.server_url(config))?)
    };

    let engine_config = TurnEngineConfig {
        client_id: "local".to_string(),
        typing_delay: Duration::from_millis(config.chat.typing_delay_ms),
        reply_seed: config.chat.reply_seed,
        personas: PERSONAS,
    };

    tracing::debug!(mode = %options.mode_label(config), "Turn engine ready");
    Ok(TurnEngine::new(store, objects, quota, engine_config))
}
