//! queue_enqueue tool implementation.
//!
//! Records a user action locally; it is replayed on the next sync pass.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use roamsync_client::SyncEngine;
use roamsync_core::{ActionPayload, QueuedAction, SyncStatus};

use super::json_result;

/// Parameters for the queue_enqueue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueEnqueueParams {
    /// One of favorite, unfavorite, visit, mission_start, mission_progress, profile_update.
    pub action_type: String,

    /// Payload for the action type, e.g. `{"mission_id": "m1", "progress": 3}`.
    pub action_data: Value,

    /// Client-generated id for an idempotent retry of an earlier enqueue.
    #[serde(default)]
    pub id: Option<String>,
}

/// Output from the queue_enqueue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueueEnqueueOutput {
    pub action: QueuedAction,
    pub status: SyncStatus,
}

/// Implementation of the queue_enqueue tool.
pub async fn enqueue_impl(engine: &SyncEngine, params: QueueEnqueueParams) -> Result<CallToolResult, McpError> {
    let payload = ActionPayload::from_parts(&params.action_type, params.action_data)?;
    let action = match params.id {
        Some(id) => QueuedAction::with_id(id, payload, chrono::Utc::now()),
        None => QueuedAction::new(payload),
    };
    if action.id.trim().is_empty() {
        return Err(roamsync_core::Error::InvalidInput("action id must not be empty".into()).into());
    }

    let action = engine.enqueue_action(action).await?;
    json_result(&QueueEnqueueOutput { action, status: engine.status() })
}
