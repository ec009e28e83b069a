//! Infrastructure layer for Parley.
//!
//! Contains implementations of the ports defined in `parley-core`: JSON-file
//! and SQLite key-value stores, the local attachment store, and the HTTP
//! client that consults a running `parley serve` for quota. Also owns config
//! loading and data directory resolution.

pub mod config;
pub mod filesystem;
pub mod quota;
pub mod sqlite;
pub mod storage;
