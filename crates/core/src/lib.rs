//! Core types and local state for roamsync.
//!
//! This crate provides:
//! - Local persistence (record stores, TTL cache, action log) on SQLite
//! - Queued action types
//! - Connectivity tracking and sync status
//! - Unified error types
//! - Configuration structures

pub mod action;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod status;
pub mod store;

pub use action::{ActionPayload, ActionType, QueuedAction};
pub use config::{AppConfig, FailedActionPolicy};
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use error::Error;
pub use models::{Mission, Place, UserProgress};
pub use status::SyncStatus;
pub use store::{CacheEntry, LocalDb, LoggedAction, StoreName, StoreRecord};
