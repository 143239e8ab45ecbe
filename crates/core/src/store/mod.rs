//! SQLite-backed local persistence for offline use.
//!
//! This module provides the client's durable state using SQLite with async
//! access via tokio-rusqlite. It holds:
//!
//! - Named record stores with derived secondary indexes
//! - A time-to-live cache with lazy expiry
//! - The pending action log and its dead-letter list
//! - Versioned schema migrations applied at open

pub mod actions;
pub mod cache;
pub mod connection;
pub mod migrations;
pub mod records;
pub mod schema;

pub use crate::Error;

pub use actions::LoggedAction;
pub use cache::CacheEntry;
pub use connection::LocalDb;
pub use records::StoreRecord;
pub use schema::StoreName;
