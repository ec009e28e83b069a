//! Data directory layout for Parley.
//!
//! ```text
//! {data_dir}/
//!   config.toml
//!   conversations/      JSON-file KV store
//!   parley.db           SQLite KV store
//!   uploads/            local attachment store (served at /uploads)
//! ```

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PARLEY_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PARLEY_DATA_DIR` environment variable
/// 2. `~/.parley`
/// 3. `./.parley`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".parley");
    }

    PathBuf::from(".parley")
}

/// Directory for the JSON-file conversation store.
pub fn conversations_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("conversations")
}

/// Directory for uploaded attachments.
pub fn uploads_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("uploads")
}

/// SQLite connection URL for the client database.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("parley.db").display())
}

/// Create the data directory and its subdirectories if missing.
pub async fn ensure_layout(data_dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(conversations_dir(data_dir)).await?;
    tokio::fs::create_dir_all(uploads_dir(data_dir)).await?;
    Ok(())
}
