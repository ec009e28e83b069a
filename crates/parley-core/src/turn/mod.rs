//! Turn engine: one user action through to a persona reply.
//!
//! - `reply`: pure reply selection over an injected RNG
//! - `phase`: the per-engine turn state published to UIs
//! - `engine`: quota gate -> append user message -> typing delay -> reply

pub mod engine;
pub mod phase;
pub mod reply;
