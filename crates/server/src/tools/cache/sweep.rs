//! cache_sweep tool implementation.
//!
//! Deletes every expired cache entry now instead of waiting for the sweeper.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use roamsync_client::SyncEngine;

use crate::tools::json_result;

/// Output from the cache_sweep tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSweepOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_sweep tool.
pub async fn sweep_impl(engine: &SyncEngine) -> Result<CallToolResult, McpError> {
    let deleted = engine.cleanup_expired_cache().await?;
    json_result(&CacheSweepOutput { deleted })
}
