//! Application state for `parley serve`.
//!
//! AppState holds the quota service and settings shared by every HTTP handler.
//! The service is generic over its clock; AppState pins it to the system clock.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::quota::service::QuotaService;
use parley_infra::filesystem::{ensure_layout, uploads_dir};
use parley_types::config::GlobalConfig;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub quota: Arc<QuotaService>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Prepare the data directory and build the quota service from config.
    pub async fn init(data_dir: PathBuf, config: GlobalConfig) -> anyhow::Result<Self> {
        ensure_layout(&data_dir).await?;
        Ok(Self::new(data_dir, config))
    }

    pub fn new(data_dir: PathBuf, config: GlobalConfig) -> Self {
        let quota = QuotaService::with_limit(config.quota.effective_limit());
        Self {
            quota: Arc::new(quota),
            config: Arc::new(config),
            data_dir,
        }
    }

    /// Directory served at `/uploads`.
    pub fn uploads_dir(&self) -> PathBuf {
        uploads_dir(&self.data_dir)
    }
}
