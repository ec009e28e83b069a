//! Remote quota gate.

pub mod http_client;
