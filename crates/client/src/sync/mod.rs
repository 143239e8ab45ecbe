//! Offline action queue and reconciliation.
//!
//! [`SyncEngine`] is the explicitly owned queue service: it appends actions
//! to the local log, mirrors them remotely when online, and runs
//! reconciliation passes that replay the merged queue through the
//! dispatcher.
//!
//! ### Pass
//!
//! 1. Read the local log (oldest first) and the dead-letter ids.
//! 2. Read the unsynced rows of the remote mirror; a missing mirror reads as empty.
//!    Rows already dead-lettered are retired instead of replayed.
//! 3. Concatenate local then remote, keeping the first occurrence of each id.
//! 4. Dispatch each action in order; a failure is logged and the pass continues.
//! 5. Mark replayed mirror rows synced.
//! 6. Settle the local entries read in step 1 according to [`FailedActionPolicy`].
//!    Under `Retain` a failed remote-only action joins the local log, and a
//!    dead-lettered action retires its mirror row.
//!
//! Errors in steps 1 and 2 abort the pass and leave the local log untouched.

mod engine;
mod reconcile;

pub use engine::SyncEngine;
pub use reconcile::{MergedAction, Origin, merge_queues};

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use roamsync_core::{AppConfig, FailedActionPolicy};

/// Result of a sync trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// A pass ran to completion.
    Completed(SyncReport),
    /// Another pass was in flight; this trigger was a no-op.
    AlreadyRunning,
    /// The client is offline; no pass was attempted.
    Offline,
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Actions whose remote operation succeeded.
    pub replayed: u32,
    /// Actions whose remote operation failed.
    pub failed: u32,
    /// Actions dropped because their type or payload could not be decoded.
    pub dropped: u32,
    /// Local actions moved to the dead-letter list this pass.
    pub dead_lettered: u32,
    /// Mirror rows flagged as synced.
    pub marked_synced: u32,
    /// Actions that came only from the remote mirror.
    pub remote_merged: u32,
}

/// Transient notification emitted around each pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Started,
    Completed(SyncReport),
    Failed { reason: String },
}

/// Tunables for the queue, the reconciler and the cache helpers.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub failed_actions: FailedActionPolicy,
    pub max_replay_attempts: u32,
    /// TTL for reference/catalog data (missions, places).
    pub catalog_ttl: Duration,
    /// TTL for user-progress snapshots.
    pub progress_ttl: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SyncOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            failed_actions: config.failed_actions,
            max_replay_attempts: config.max_replay_attempts,
            catalog_ttl: config.catalog_ttl(),
            progress_ttl: config.progress_ttl(),
        }
    }
}

/// Which reference TTL a cache write uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    Catalog,
    Progress,
}
