//! MCP tool implementations.
//!
//! Each tool is a free `*_impl` function over the shared [`SyncEngine`], so
//! it can be tested without a transport.

pub mod cache;
pub mod connectivity;
pub mod local_data;
pub mod queue;
pub mod store;
pub mod sync;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| ToolError::OutputFailed(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
