//! cache_write tool implementation.
//!
//! Stores a JSON value under a namespaced key (e.g. `missions_Paris_France`)
//! with an explicit TTL or one of the reference policies.

use std::time::Duration;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use roamsync_client::{CachePolicy, SyncEngine};
use roamsync_core::CacheEntry;

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_write tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheWriteParams {
    /// Cache key.
    pub key: String,

    /// Value to cache; replaces any previous entry wholesale.
    pub value: Value,

    /// Time to live in milliseconds.
    #[serde(default)]
    pub ttl_ms: Option<u64>,

    /// Reference TTL to use instead of `ttl_ms`: catalog (24h) or progress (30min).
    #[serde(default)]
    pub policy: Option<CachePolicy>,
}

/// Output from the cache_write tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheWriteOutput {
    pub entry: CacheEntry,
}

/// Implementation of the cache_write tool.
pub async fn write_impl(engine: &SyncEngine, params: CacheWriteParams) -> Result<CallToolResult, McpError> {
    let ttl = match (params.ttl_ms, params.policy) {
        (Some(_), Some(_)) => {
            return Err(ToolError::InvalidInput("Specify either ttl_ms or policy, not both".into()).into());
        }
        (Some(0), None) => return Err(ToolError::InvalidInput("ttl_ms must be greater than 0".into()).into()),
        (Some(ms), None) => Duration::from_millis(ms),
        (None, Some(policy)) => engine.ttl_for(policy),
        (None, None) => return Err(ToolError::InvalidInput("One of ttl_ms or policy is required".into()).into()),
    };

    let entry = engine.cache_write(&params.key, &params.value, ttl).await?;
    json_result(&CacheWriteOutput { entry })
}
