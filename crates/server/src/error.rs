//! Structured errors for the roamsync server.
//!
//! Tool-level failures that are not storage or sync errors.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Structured errors for the roamsync tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid or conflicting tool parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be serialized.
    #[error("OUTPUT_FAILED: {0}")]
    OutputFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::OutputFailed(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
