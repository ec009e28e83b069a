//! HTTP layer for `parley serve`.
//!
//! Quota endpoints under `/api/`, a health check, and static serving of
//! uploaded attachments under `/uploads/`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
