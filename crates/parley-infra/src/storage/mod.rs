//! Filesystem-backed storage adapters.

pub mod json_file;
pub mod local_objects;
