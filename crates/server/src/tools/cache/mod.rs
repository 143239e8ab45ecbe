//! Cache-related MCP tools.
//!
//! This module provides tools for reading and writing the local TTL cache.

pub mod read;
pub mod sweep;
pub mod write;

pub use read::{CacheReadParams, read_impl};
pub use sweep::sweep_impl;
pub use write::{CacheWriteParams, write_impl};
