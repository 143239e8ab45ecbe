//! local_data_clear tool implementation.
//!
//! Wipes every local store, the cache, the pending queue and the dead
//! letters, e.g. on sign-out. Pending actions are lost.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use roamsync_client::SyncEngine;
use roamsync_core::SyncStatus;

use super::json_result;
use crate::error::ToolError;

/// Parameters for the local_data_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocalDataClearParams {
    /// Must be true; pending actions are discarded without replay.
    pub confirm: bool,
}

/// Output from the local_data_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocalDataClearOutput {
    /// Actions that were still pending when the data was cleared.
    pub discarded_actions: u64,
    pub status: SyncStatus,
}

/// Implementation of the local_data_clear tool.
pub async fn clear_impl(engine: &SyncEngine, params: LocalDataClearParams) -> Result<CallToolResult, McpError> {
    if !params.confirm {
        return Err(ToolError::InvalidInput("Set confirm to true to clear all local data".into()).into());
    }

    let discarded_actions = engine.db().pending_count().await?;
    if discarded_actions > 0 {
        tracing::warn!(discarded_actions, "clearing local data with pending actions");
    }
    engine.clear_all_local_data().await?;

    json_result(&LocalDataClearOutput { discarded_actions, status: engine.status() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use roamsync_client::MemoryBackend;
    use roamsync_core::{ActionPayload, Place};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;
        engine
            .enqueue(ActionPayload::Favorite { place_id: "p1".into() })
            .await
            .unwrap();

        assert!(clear_impl(&engine, LocalDataClearParams { confirm: false }).await.is_err());
        assert_eq!(engine.status().pending_count, 1);
    }

    #[tokio::test]
    async fn test_clear_wipes_everything() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;
        engine
            .enqueue(ActionPayload::Favorite { place_id: "p1".into() })
            .await
            .unwrap();
        engine.cache_write("k", &1, Duration::from_secs(60)).await.unwrap();
        let place = Place {
            id: "p1".into(),
            name: "Louvre".into(),
            city: "Paris".into(),
            category: "museum".into(),
            latitude: None,
            longitude: None,
            updated_at: None,
        };
        engine.db().put(&place).await.unwrap();

        let result = clear_impl(&engine, LocalDataClearParams { confirm: true }).await.unwrap();
        let output: LocalDataClearOutput = testing::output(&result);

        assert_eq!(output.discarded_actions, 1);
        assert_eq!(output.status.pending_count, 0);
        assert!(engine.db().get::<Place>("p1").await.unwrap().is_none());
        assert_eq!(engine.cache_read::<i32>("k").await.unwrap(), None);
    }
}
