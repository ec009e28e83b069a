//! Route handlers.

pub mod usage;
