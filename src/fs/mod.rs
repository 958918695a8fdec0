//! File System Module
//!
//! Virtual file system abstraction consumed by the interpreter, plus the
//! default in-memory backend.

pub mod types;
pub mod in_memory_fs;

pub use types::*;
pub use in_memory_fs::InMemoryFs;
