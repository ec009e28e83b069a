//! SQLite persistence.
//!
//! A split reader/writer pool in WAL mode plus the `KvStore` implementation
//! used when `chat.storage = "sqlite"`.

pub mod kv;
pub mod pool;
