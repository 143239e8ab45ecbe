//! Unified error types for roamsync.
//!
//! The sync-specific variants follow the failure taxonomy of the offline
//! queue: storage degradation, a missing remote mirror, per-action replay
//! failures and passes aborted before the local log is touched.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the roamsync crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty cache key).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Local persistence cannot be opened or written (quota, permissions).
    ///
    /// Callers treat this as "run without persistence for this session".
    #[error("STORAGE_UNAVAILABLE: {0}")]
    StorageUnavailable(String),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A record or payload could not be (de)serialized.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(String),

    /// No store with this name exists in the local schema.
    #[error("UNKNOWN_STORE: {0}")]
    UnknownStore(String),

    /// The store exists but declares no such index.
    #[error("UNKNOWN_INDEX: {store}.{index}")]
    UnknownIndex { store: String, index: String },

    /// An action type tag this build does not know how to replay.
    #[error("UNKNOWN_ACTION_TYPE: {0}")]
    UnknownActionType(String),

    /// The optional server-side queue mirror is absent.
    #[error("REMOTE_MIRROR_UNSUPPORTED: {0}")]
    RemoteMirrorUnsupported(String),

    /// A single action's remote operation failed.
    #[error("ACTION_REPLAY_FAILED: {id}: {reason}")]
    ActionReplayFailed { id: String, reason: String },

    /// A reconciliation pass aborted before clearing the local log.
    #[error("SYNC_PASS_FAILED: {0}")]
    SyncPassFailed(String),

    /// The remote backend rejected or failed a request.
    #[error("BACKEND_ERROR: {0}")]
    Backend(String),
}

impl Error {
    /// Whether this error means local persistence is unusable for the session.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }
}

/// SQLite result codes that mean the database file itself is unusable.
fn is_unavailable_code(code: rusqlite::ErrorCode) -> bool {
    matches!(
        code,
        rusqlite::ErrorCode::CannotOpen
            | rusqlite::ErrorCode::DiskFull
            | rusqlite::ErrorCode::ReadOnly
            | rusqlite::ErrorCode::PermissionDenied
            | rusqlite::ErrorCode::NotADatabase
            | rusqlite::ErrorCode::SystemIoFailure
    )
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e.into(),
            other => Error::Database(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let Some(code) = err.sqlite_error_code()
            && is_unavailable_code(code)
        {
            return Error::StorageUnavailable(err.to_string());
        }
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::UnknownStore(_) | Error::UnknownIndex { .. } | Error::UnknownActionType(_) => {
                (-32602, err.to_string())
            }
            Error::StorageUnavailable(msg) => (-32020, msg.clone()),
            Error::Database(e) => (-32021, e.to_string()),
            Error::MigrationFailed(msg) => (-32021, msg.clone()),
            Error::Serialization(msg) => (-32022, msg.clone()),
            Error::RemoteMirrorUnsupported(msg) => (-32023, msg.clone()),
            Error::ActionReplayFailed { .. } => (-32024, err.to_string()),
            Error::SyncPassFailed(msg) => (-32025, msg.clone()),
            Error::Backend(msg) => (-32026, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ActionReplayFailed { id: "abc123".to_string(), reason: "conflict".to_string() };
        assert!(err.to_string().contains("ACTION_REPLAY_FAILED"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::SyncPassFailed("remote down".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32025);

        let mcp_err: McpError = Error::InvalidInput("empty key".into()).into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_disk_full_maps_to_storage_unavailable() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error { code: rusqlite::ErrorCode::DiskFull, extended_code: 13 },
            Some("database or disk is full".into()),
        );
        let err: Error = sqlite_err.into();
        assert!(err.is_storage_unavailable());
    }

    #[test]
    fn test_constraint_violation_stays_database_error() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error { code: rusqlite::ErrorCode::ConstraintViolation, extended_code: 19 },
            None,
        );
        let err: Error = sqlite_err.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
