//! Request extractors.

pub mod client;
