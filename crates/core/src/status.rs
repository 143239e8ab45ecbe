//! Process-wide sync status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Snapshot of the queue's sync state. Recomputed after every enqueue and
/// every reconciliation pass; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncStatus {
    pub last_synced_at: Option<DateTime<Utc>>,
    pub pending_count: u64,
    pub in_progress: bool,
}
