//! connectivity_set tool implementation.
//!
//! The host forwards the platform's reachability signal here. A transition
//! to online starts a sync pass in the background.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use roamsync_client::SyncEngine;
use roamsync_core::ConnectivityEvent;

use super::json_result;

/// Parameters for the connectivity_set tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectivitySetParams {
    /// Whether the backend is currently reachable.
    pub online: bool,
}

/// Output from the connectivity_set tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectivitySetOutput {
    pub online: bool,
    /// The transition the signal caused; absent for a repeated signal.
    pub transition: Option<ConnectivityEvent>,
}

/// Implementation of the connectivity_set tool.
pub async fn set_impl(engine: &SyncEngine, params: ConnectivitySetParams) -> Result<CallToolResult, McpError> {
    let transition = engine.connectivity().set_online(params.online);
    json_result(&ConnectivitySetOutput { online: engine.connectivity().is_online(), transition })
}
