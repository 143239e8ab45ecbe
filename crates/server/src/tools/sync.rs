//! sync_trigger and sync_status tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use roamsync_client::{SyncEngine, SyncOutcome};
use roamsync_core::{LoggedAction, SyncStatus};

use super::json_result;

/// Output from the sync_trigger tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTriggerOutput {
    pub outcome: SyncOutcome,
    pub status: SyncStatus,
}

/// Parameters for the sync_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncStatusParams {
    /// Also list actions that exhausted their replay attempts.
    #[serde(default)]
    pub include_dead_letters: bool,
}

/// Output from the sync_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncStatusOutput {
    pub status: SyncStatus,
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letters: Option<Vec<LoggedAction>>,
}

/// Implementation of the sync_trigger tool.
///
/// An aborted pass surfaces as `SYNC_PASS_FAILED`; the local log is kept.
pub async fn trigger_impl(engine: &SyncEngine) -> Result<CallToolResult, McpError> {
    let outcome = engine.trigger_sync().await?;
    json_result(&SyncTriggerOutput { outcome, status: engine.status() })
}

/// Implementation of the sync_status tool.
pub async fn status_impl(engine: &SyncEngine, params: SyncStatusParams) -> Result<CallToolResult, McpError> {
    let status = engine.refresh_status().await?;
    let dead_letters = if params.include_dead_letters { Some(engine.db().dead_letters().await?) } else { None };

    json_result(&SyncStatusOutput { status, online: engine.connectivity().is_online(), dead_letters })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use roamsync_client::MemoryBackend;
    use roamsync_client::backend::{BackendError, BackendOp, QUEUE_MIRROR_TABLE};
    use roamsync_core::ActionPayload;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_replays_pending_actions() {
        let backend = Arc::new(MemoryBackend::new());
        let engine = testing::engine(backend.clone(), true).await;
        engine
            .enqueue(ActionPayload::MissionStart { mission_id: "m1".into() })
            .await
            .unwrap();

        let result = trigger_impl(&engine).await.unwrap();
        let output: SyncTriggerOutput = testing::output(&result);

        let SyncOutcome::Completed(report) = output.outcome else { panic!("expected a completed pass") };
        assert_eq!(report.replayed, 1);
        assert_eq!(output.status.pending_count, 0);
        assert!(output.status.last_synced_at.is_some());
        assert_eq!(backend.rows("user_missions").len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_offline() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;

        let result = trigger_impl(&engine).await.unwrap();
        let output: SyncTriggerOutput = testing::output(&result);

        assert_eq!(output.outcome, SyncOutcome::Offline);
    }

    #[tokio::test]
    async fn test_trigger_failed_pass_is_an_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_on(BackendOp::Select, QUEUE_MIRROR_TABLE, BackendError::Timeout);
        let engine = testing::engine(backend, true).await;

        let err = trigger_impl(&engine).await.unwrap_err();
        assert_eq!(err.code.0, -32025);
        assert!(err.message.contains("reading queue mirror"));
    }

    #[tokio::test]
    async fn test_status_reports_pending_and_dead_letters() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;
        engine
            .enqueue(ActionPayload::Favorite { place_id: "p1".into() })
            .await
            .unwrap();

        let result = status_impl(&engine, SyncStatusParams { include_dead_letters: true }).await.unwrap();
        let output: SyncStatusOutput = testing::output(&result);

        assert_eq!(output.status.pending_count, 1);
        assert!(!output.status.in_progress);
        assert!(!output.online);
        assert_eq!(output.dead_letters, Some(vec![]));
    }
}
