//! Maps queued actions to remote operations.
//!
//! The mapping itself is pure ([`remote_op`]); [`Dispatcher`] executes the
//! resulting operation once, with no retry of its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use roamsync_core::{ActionPayload, QueuedAction};

use crate::backend::{
    BackendError, FAVORITES_TABLE, Filter, PROFILES_TABLE, RemoteBackend, USER_MISSIONS_TABLE, VISITS_TABLE,
};

/// Status of a user-mission row once started.
pub const MISSION_IN_PROGRESS: &str = "in_progress";

/// Status of a user-mission row once completed.
pub const MISSION_COMPLETED: &str = "completed";

/// A single remote row operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Insert { table: &'static str, row: Value },
    Update { table: &'static str, filters: Vec<Filter>, changes: Value },
    Delete { table: &'static str, filters: Vec<Filter> },
}

impl RemoteOp {
    pub fn table(&self) -> &'static str {
        match self {
            RemoteOp::Insert { table, .. } | RemoteOp::Update { table, .. } | RemoteOp::Delete { table, .. } => table,
        }
    }
}

/// The remote operation an action stands for, on behalf of `user_id`.
pub fn remote_op(user_id: &str, action: &QueuedAction) -> RemoteOp {
    let at = action.created_at.to_rfc3339();
    match &action.payload {
        ActionPayload::Favorite { place_id } => RemoteOp::Insert {
            table: FAVORITES_TABLE,
            row: json!({ "user_id": user_id, "place_id": place_id, "created_at": at }),
        },
        ActionPayload::Unfavorite { place_id } => RemoteOp::Delete {
            table: FAVORITES_TABLE,
            filters: vec![Filter::eq("user_id", user_id), Filter::eq("place_id", place_id.as_str())],
        },
        ActionPayload::Visit { place_id, mission_id, visited_at } => RemoteOp::Insert {
            table: VISITS_TABLE,
            row: json!({
                "user_id": user_id,
                "place_id": place_id,
                "mission_id": mission_id,
                "visited_at": visited_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| at.clone()),
            }),
        },
        ActionPayload::MissionStart { mission_id } => RemoteOp::Insert {
            table: USER_MISSIONS_TABLE,
            row: json!({
                "user_id": user_id,
                "mission_id": mission_id,
                "progress": 0,
                "status": MISSION_IN_PROGRESS,
                "started_at": at,
            }),
        },
        ActionPayload::MissionProgress { mission_id, progress, completed } => {
            let mut changes = json!({ "progress": progress, "updated_at": at });
            if *completed == Some(true) {
                changes["status"] = json!(MISSION_COMPLETED);
                changes["completed_at"] = json!(at);
            }
            RemoteOp::Update {
                table: USER_MISSIONS_TABLE,
                filters: vec![Filter::eq("user_id", user_id), Filter::eq("mission_id", mission_id.as_str())],
                changes,
            }
        }
        ActionPayload::ProfileUpdate(fields) => {
            let mut changes = fields.clone();
            changes.insert("updated_at".into(), json!(at));
            RemoteOp::Update {
                table: PROFILES_TABLE,
                filters: vec![Filter::eq("id", user_id)],
                changes: Value::Object(changes),
            }
        }
    }
}

/// Decode a stored action, dropping unknown or malformed payloads with a warning.
pub fn decode_action(
    id: &str, action_type: &str, action_data: &Value, created_at: DateTime<Utc>,
) -> Option<QueuedAction> {
    match ActionPayload::from_parts(action_type, action_data.clone()) {
        Ok(payload) => Some(QueuedAction::with_id(id, payload, created_at)),
        Err(err) => {
            tracing::warn!(id, action_type, error = %err, "dropping action that cannot be replayed");
            None
        }
    }
}

/// Executes actions against the remote backend for one user.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn RemoteBackend>,
    user_id: String,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn RemoteBackend>, user_id: impl Into<String>) -> Self {
        Self { backend, user_id: user_id.into() }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Perform the action's remote operation once.
    pub async fn dispatch(&self, action: &QueuedAction) -> Result<(), BackendError> {
        let op = remote_op(&self.user_id, action);
        tracing::debug!(id = %action.id, action_type = %action.action_type(), table = op.table(), "dispatching action");

        match op {
            RemoteOp::Insert { table, row } => self.backend.insert(table, row).await,
            RemoteOp::Update { table, filters, changes } => self.backend.update(table, &filters, changes).await,
            RemoteOp::Delete { table, filters } => self.backend.delete(table, &filters).await,
        }
    }
}
