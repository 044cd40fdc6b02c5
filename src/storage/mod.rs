//! Server file area
//!
//! Resolves filenames against the configured storage directory and lists it.

pub mod operations;

pub use operations::{ensure_storage_dir, list_directory, prepare_file_retrieval, resolve_file};
