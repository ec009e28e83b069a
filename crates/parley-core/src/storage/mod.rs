//! Storage ports for Parley.
//!
//! Defines the key-value persistence trait used by the conversation store and
//! the object store trait used for attachment uploads. Durable
//! implementations live in parley-infra; `memory` holds in-process ones.

pub mod kv_store;
pub mod memory;
pub mod object_store;
