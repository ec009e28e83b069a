//! Business logic and port definitions for Parley.
//!
//! This crate owns the quota ledger and service, the conversation store, and
//! the turn engine. It defines the "ports" (key-value persistence, object
//! storage, quota gate) that `parley-infra` implements, and depends only on
//! `parley-types` -- never on `parley-infra` or any database/IO crate.

pub mod conversation;
pub mod persona;
pub mod quota;
pub mod storage;
pub mod turn;
