//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{self, CacheReadParams, CacheWriteParams},
    connectivity::{self, ConnectivitySetParams},
    local_data::{self, LocalDataClearParams},
    queue::{self, QueueEnqueueParams},
    store::{self, StoreDeleteParams, StoreGetParams, StorePutParams, StoreQueryParams},
    sync::{self, SyncStatusParams},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo, SetLevelRequestParam,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use roamsync_client::SyncEngine;

/// The main MCP server handler for roamsync.
#[derive(Clone)]
pub struct RoamsyncServer {
    engine: Arc<SyncEngine>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl RoamsyncServer {
    /// Create a new server handler around a shared engine.
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Queue a user action (favorite, unfavorite, visit, mission_start, mission_progress, profile_update). Works offline; replayed on the next sync."
    )]
    async fn queue_enqueue(&self, params: Parameters<QueueEnqueueParams>) -> Result<CallToolResult, McpError> {
        queue::enqueue_impl(&self.engine, params.0).await
    }

    #[tool(description = "Run a reconciliation pass now. No-op when offline or when a pass is already running.")]
    async fn sync_trigger(&self) -> Result<CallToolResult, McpError> {
        sync::trigger_impl(&self.engine).await
    }

    #[tool(description = "Pending action count, last successful sync time and whether a pass is running.")]
    async fn sync_status(&self, params: Parameters<SyncStatusParams>) -> Result<CallToolResult, McpError> {
        sync::status_impl(&self.engine, params.0).await
    }

    #[tool(description = "Cache a JSON value under a key with ttl_ms or a reference policy (catalog, progress).")]
    async fn cache_write(&self, params: Parameters<CacheWriteParams>) -> Result<CallToolResult, McpError> {
        cache::write_impl(&self.engine, params.0).await
    }

    #[tool(description = "Read a cached value. Expired entries are a miss and are evicted.")]
    async fn cache_read(&self, params: Parameters<CacheReadParams>) -> Result<CallToolResult, McpError> {
        cache::read_impl(&self.engine, params.0).await
    }

    #[tool(description = "Delete every expired cache entry.")]
    async fn cache_sweep(&self) -> Result<CallToolResult, McpError> {
        cache::sweep_impl(&self.engine).await
    }

    #[tool(description = "Write records to a local store (missions, places, userProgress).")]
    async fn store_put(&self, params: Parameters<StorePutParams>) -> Result<CallToolResult, McpError> {
        store::put_impl(&self.engine, params.0).await
    }

    #[tool(description = "Read one record from a local store by id.")]
    async fn store_get(&self, params: Parameters<StoreGetParams>) -> Result<CallToolResult, McpError> {
        store::get_impl(&self.engine, params.0).await
    }

    #[tool(description = "List a local store, optionally filtered by one of its indexes.")]
    async fn store_query(&self, params: Parameters<StoreQueryParams>) -> Result<CallToolResult, McpError> {
        store::query_impl(&self.engine, params.0).await
    }

    #[tool(description = "Delete one record from a local store, or clear the store when no id is given.")]
    async fn store_delete(&self, params: Parameters<StoreDeleteParams>) -> Result<CallToolResult, McpError> {
        store::delete_impl(&self.engine, params.0).await
    }

    #[tool(description = "Report the platform connectivity signal. Coming online starts a sync pass.")]
    async fn connectivity_set(&self, params: Parameters<ConnectivitySetParams>) -> Result<CallToolResult, McpError> {
        connectivity::set_impl(&self.engine, params.0).await
    }

    #[tool(description = "Wipe all local stores, the cache and the pending queue. Requires confirm=true.")]
    async fn local_data_clear(&self, params: Parameters<LocalDataClearParams>) -> Result<CallToolResult, McpError> {
        local_data::clear_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for RoamsyncServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "roamsync".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_logging().enable_tools().build(),
            ..Default::default()
        }
    }

    /// Sync notifications are always sent; the requested level is only logged.
    async fn set_level(
        &self, request: SetLevelRequestParam, _context: RequestContext<RoleServer>,
    ) -> Result<(), rmcp::model::ErrorData> {
        tracing::debug!(level = ?request.level, "client set logging level");
        Ok(())
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use roamsync_client::MemoryBackend;

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let engine = testing::engine(Arc::new(MemoryBackend::new()), false).await;
        let server = RoamsyncServer::new(engine);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "cache_read",
                "cache_sweep",
                "cache_write",
                "connectivity_set",
                "local_data_clear",
                "queue_enqueue",
                "store_delete",
                "store_get",
                "store_put",
                "store_query",
                "sync_status",
                "sync_trigger",
            ]
        );
    }
}
