//! Shared domain types for Parley.
//!
//! This crate contains the types used across the Parley workspace: quota
//! records and wire bodies, chat sessions and messages, configuration, and
//! the error enums every layer reports through.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod quota;
