//! Remote backend error types.

use std::sync::Arc;

/// SQLSTATE for an undefined table.
const PG_UNDEFINED_TABLE: &str = "42P01";

/// PostgREST code for a table missing from its schema cache.
const PGRST_TABLE_NOT_FOUND: &str = "PGRST205";

/// Errors from the remote data backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The backend URL or user id is not configured.
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// The target table does not exist on the backend.
    #[error("relation not found: {0}")]
    RelationNotFound(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// HTTP error response.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, code: Option<String>, message: String },

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Build an error from a non-success response, recognising a missing table.
    pub fn from_response(table: &str, status: u16, code: Option<String>, message: String) -> Self {
        let missing = matches!(code.as_deref(), Some(PG_UNDEFINED_TABLE | PGRST_TABLE_NOT_FOUND))
            || (message.contains("relation") && message.contains("does not exist"))
            || (status == 404 && code.is_none());
        if missing {
            BackendError::RelationNotFound(table.to_string())
        } else {
            BackendError::Http { status, code, message }
        }
    }

    /// Whether the error means the addressed table is absent.
    pub fn is_relation_missing(&self) -> bool {
        matches!(self, BackendError::RelationNotFound(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { BackendError::Timeout } else { BackendError::Network(Arc::new(err)) }
    }
}

impl From<BackendError> for roamsync_core::Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::RelationNotFound(table) => roamsync_core::Error::RemoteMirrorUnsupported(table),
            other => roamsync_core::Error::Backend(other.to_string()),
        }
    }
}
