//! Remote data backend.
//!
//! The backend is a row store addressed by table name. Every operation
//! selects rows by column equality, which is all the dispatcher and the
//! queue mirror need.
//!
//! ### Tables
//!
//! - `favorites(user_id, place_id, created_at)`
//! - `visits(user_id, place_id, mission_id?, visited_at)`
//! - `user_missions(user_id, mission_id, progress, status, started_at)`
//! - `profiles(id, ...)`
//! - `offline_queue(id, user_id, action_type, action_data, synced, synced_at, created_at)`, optional

pub mod error;
pub mod memory;
pub mod rest;

pub use error::BackendError;
pub use memory::{BackendCall, BackendOp, MemoryBackend};
pub use rest::{RestBackend, RestConfig};

use async_trait::async_trait;
use serde_json::Value;

pub const FAVORITES_TABLE: &str = "favorites";
pub const VISITS_TABLE: &str = "visits";
pub const USER_MISSIONS_TABLE: &str = "user_missions";
pub const PROFILES_TABLE: &str = "profiles";
pub const QUEUE_MIRROR_TABLE: &str = "offline_queue";

/// Column equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), value: value.into() }
    }

    /// Whether a JSON row satisfies this filter.
    ///
    /// Non-string columns compare by their JSON text, so `false` matches `"false"`.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Row-level access to the remote data backend.
///
/// Implementations apply no retries; the reconciler retries at pass level.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Insert one row.
    async fn insert(&self, table: &str, row: Value) -> Result<(), BackendError>;

    /// Overwrite the given columns on every row matching all filters.
    async fn update(&self, table: &str, filters: &[Filter], changes: Value) -> Result<(), BackendError>;

    /// Delete every row matching all filters.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError>;

    /// Rows matching all filters, ascending by `order_by` when given.
    async fn select(&self, table: &str, filters: &[Filter], order_by: Option<&str>)
    -> Result<Vec<Value>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_strings_and_scalars() {
        let row = json!({"user_id": "u1", "synced": false, "progress": 3});
        assert!(Filter::eq("user_id", "u1").matches(&row));
        assert!(!Filter::eq("user_id", "u2").matches(&row));
        assert!(Filter::eq("synced", "false").matches(&row));
        assert!(Filter::eq("progress", "3").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }
}
