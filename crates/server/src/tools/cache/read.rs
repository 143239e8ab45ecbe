//! cache_read tool implementation.
//!
//! Expired entries read as a miss and are evicted.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use roamsync_client::SyncEngine;

use crate::tools::json_result;

/// Parameters for the cache_read tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheReadParams {
    /// Cache key.
    pub key: String,
}

/// Output from the cache_read tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheReadOutput {
    pub key: String,
    pub hit: bool,
    pub value: Option<Value>,
}

/// Implementation of the cache_read tool.
pub async fn read_impl(engine: &SyncEngine, params: CacheReadParams) -> Result<CallToolResult, McpError> {
    let value: Option<Value> = engine.cache_read(&params.key).await?;
    json_result(&CacheReadOutput { hit: value.is_some(), key: params.key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use roamsync_client::MemoryBackend;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_read_hit() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;
        let places = json!(["Louvre", "Sainte-Chapelle"]);
        engine
            .cache_write("places_Paris", &places, Duration::from_millis(86_400_000))
            .await
            .unwrap();

        let result = read_impl(&engine, CacheReadParams { key: "places_Paris".into() }).await.unwrap();
        let output: CacheReadOutput = testing::output(&result);

        assert!(output.hit);
        assert_eq!(output.value, Some(places));
    }

    #[tokio::test]
    async fn test_read_expired_is_a_miss() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;
        engine.cache_write("k", &json!(1), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = read_impl(&engine, CacheReadParams { key: "k".into() }).await.unwrap();
        let output: CacheReadOutput = testing::output(&result);

        assert!(!output.hit);
        assert!(output.value.is_none());
        assert!(engine.db().get_all_cache().await.unwrap().is_empty());
    }
}
