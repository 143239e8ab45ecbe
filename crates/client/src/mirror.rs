//! Server-side mirror of the action queue.
//!
//! The mirror lets actions queued on this device be seen (and replayed) even
//! if the local log is lost before a pass. It is optional: a backend without
//! the table reports `RelationNotFound`, which callers treat as an empty mirror.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use roamsync_core::QueuedAction;

use crate::backend::{BackendError, Filter, QUEUE_MIRROR_TABLE, RemoteBackend};

/// A row of the `offline_queue` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRow {
    pub id: String,
    pub user_id: String,
    pub action_type: String,
    #[serde(default)]
    pub action_data: Value,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MirrorRow {
    pub fn from_action(user_id: &str, action: &QueuedAction) -> Self {
        Self {
            id: action.id.clone(),
            user_id: user_id.to_string(),
            action_type: action.action_type().as_str().to_string(),
            action_data: action.payload.data(),
            synced: false,
            synced_at: None,
            created_at: action.created_at,
        }
    }
}

/// Reads and writes one user's rows in the queue mirror.
#[derive(Clone)]
pub struct QueueMirror {
    backend: Arc<dyn RemoteBackend>,
    user_id: String,
}

impl QueueMirror {
    pub fn new(backend: Arc<dyn RemoteBackend>, user_id: impl Into<String>) -> Self {
        Self { backend, user_id: user_id.into() }
    }

    /// Mirror a freshly queued action.
    pub async fn write(&self, action: &QueuedAction) -> Result<(), BackendError> {
        let row = serde_json::to_value(MirrorRow::from_action(&self.user_id, action))
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        self.backend.insert(QUEUE_MIRROR_TABLE, row).await
    }

    /// Unsynced rows for this user, oldest first.
    ///
    /// Rows that do not parse are skipped with a warning.
    pub async fn pending(&self) -> Result<Vec<MirrorRow>, BackendError> {
        let filters = [Filter::eq("user_id", self.user_id.as_str()), Filter::eq("synced", "false")];
        let rows = self
            .backend
            .select(QUEUE_MIRROR_TABLE, &filters, Some("created_at"))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<MirrorRow>(row) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed queue mirror row");
                    None
                }
            })
            .collect())
    }

    /// Flag a row as replayed.
    pub async fn mark_synced(&self, id: &str, at: DateTime<Utc>) -> Result<(), BackendError> {
        let filters = [Filter::eq("id", id)];
        self.backend
            .update(QUEUE_MIRROR_TABLE, &filters, json!({ "synced": true, "synced_at": at.to_rfc3339() }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendOp, MemoryBackend};
    use roamsync_core::ActionPayload;

    fn mirror() -> (Arc<MemoryBackend>, QueueMirror) {
        let backend = Arc::new(MemoryBackend::new());
        let mirror = QueueMirror::new(backend.clone(), "u1");
        (backend, mirror)
    }

    #[tokio::test]
    async fn test_write_then_read_pending() {
        let (backend, mirror) = mirror();
        let action = QueuedAction::new(ActionPayload::Favorite { place_id: "p1".into() });

        mirror.write(&action).await.unwrap();

        let row = &backend.rows(QUEUE_MIRROR_TABLE)[0];
        assert_eq!(row["action_type"], "favorite");
        assert_eq!(row["action_data"], json!({"place_id": "p1"}));
        assert_eq!(row["synced"], false);

        let pending = mirror.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, action.id);
    }

    fn row(id: &str, user: &str, synced: bool) -> Value {
        json!({
            "id": id,
            "user_id": user,
            "action_type": "favorite",
            "action_data": {},
            "synced": synced,
            "created_at": Utc::now().to_rfc3339(),
        })
    }

    #[tokio::test]
    async fn test_pending_excludes_synced_and_other_users() {
        let (backend, mirror) = mirror();
        backend.seed(
            QUEUE_MIRROR_TABLE,
            [
                row("1", "u1", true),
                row("2", "u2", false),
                row("3", "u1", false),
                json!({"id": "4", "user_id": "u1", "synced": false}),
            ],
        );

        let ids: Vec<String> = mirror.pending().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["3"]);
    }

    #[tokio::test]
    async fn test_mark_synced() {
        let (backend, mirror) = mirror();
        let action = QueuedAction::new(ActionPayload::MissionStart { mission_id: "m1".into() });
        mirror.write(&action).await.unwrap();

        mirror.mark_synced(&action.id, Utc::now()).await.unwrap();

        assert_eq!(backend.rows(QUEUE_MIRROR_TABLE)[0]["synced"], true);
        assert!(mirror.pending().await.unwrap().is_empty());
        assert_eq!(backend.calls_to(BackendOp::Update, QUEUE_MIRROR_TABLE).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_surfaces_relation_not_found() {
        let (backend, mirror) = mirror();
        backend.drop_table(QUEUE_MIRROR_TABLE);
        assert!(mirror.pending().await.unwrap_err().is_relation_missing());
    }
}
