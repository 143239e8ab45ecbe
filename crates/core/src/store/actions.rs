//! Durable action log and dead-letter list.
//!
//! The log is append-only from the caller's side: entries are only removed
//! by the reconciler once a pass has accounted for them. Replay order is
//! creation time, then insertion order.

use super::connection::LocalDb;
use crate::Error;
use crate::action::{ActionPayload, QueuedAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// An action as persisted, before its payload is decoded.
///
/// Rows written by a newer build may carry an action type this build does
/// not know; they stay readable so the reconciler can drop them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct LoggedAction {
    pub id: String,
    pub action_type: String,
    pub action_data: Value,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl LoggedAction {
    /// Decode the stored payload into a typed action.
    pub fn decode(&self) -> Result<QueuedAction, Error> {
        let payload = ActionPayload::from_parts(&self.action_type, self.action_data.clone())?;
        Ok(QueuedAction::with_id(self.id.clone(), payload, self.created_at))
    }
}

type ActionRow = (String, String, String, i64, i64, Option<String>);

fn logged_from_row((id, action_type, action_data, created_at, attempts, last_error): ActionRow) -> LoggedAction {
    LoggedAction {
        id,
        action_type,
        action_data: serde_json::from_str(&action_data).unwrap_or(Value::Null),
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
        attempts: attempts.max(0) as u32,
        last_error,
    }
}

fn read_rows(stmt: &mut rusqlite::Statement<'_>) -> Result<Vec<ActionRow>, rusqlite::Error> {
    stmt.query_map([], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
    })?
    .collect()
}

impl LocalDb {
    /// Append an action to the local log.
    ///
    /// Returns false if an action with the same id is already logged.
    pub async fn append_action(&self, action: &QueuedAction) -> Result<bool, Error> {
        let id = action.id.clone();
        let action_type = action.action_type().as_str();
        let action_data = action.payload.data().to_string();
        let created_at = action.created_at.timestamp_millis();

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO action_log (id, action_type, action_data, created_at)
                    VALUES (?1, ?2, ?3, ?4)",
                    params![id, action_type, action_data, created_at],
                )?;
                Ok(inserted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Every logged action, oldest first.
    pub async fn pending_actions(&self) -> Result<Vec<LoggedAction>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<ActionRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, action_type, action_data, created_at, attempts, last_error
                    FROM action_log ORDER BY created_at ASC, seq ASC",
                )?;
                Ok(read_rows(&mut stmt)?)
            })
            .await
            .map_err(Error::from)?;

        Ok(rows.into_iter().map(logged_from_row).collect())
    }

    /// A logged action by id.
    pub async fn logged_action(&self, id: &str) -> Result<Option<LoggedAction>, Error> {
        let id = id.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<ActionRow>, Error> {
                let result = conn.query_row(
                    "SELECT id, action_type, action_data, created_at, attempts, last_error
                    FROM action_log WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?)),
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        Ok(row.map(logged_from_row))
    }

    /// Number of actions waiting in the local log.
    pub async fn pending_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM action_log", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the given ids from the local log.
    ///
    /// Returns the number of removed entries.
    pub async fn remove_actions(&self, ids: &[String]) -> Result<u64, Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut stmt = tx.prepare("DELETE FROM action_log WHERE id = ?1")?;
                    for id in &ids {
                        removed += stmt.execute(params![id])?;
                    }
                }
                tx.commit()?;
                Ok(removed as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count a failed replay against an action.
    ///
    /// Returns the new attempt count, or None if the id is not logged.
    pub async fn record_action_failure(&self, id: &str, reason: &str) -> Result<Option<u32>, Error> {
        let id = id.to_string();
        let reason = reason.to_string();
        self.conn
            .call(move |conn| -> Result<Option<u32>, Error> {
                let updated = conn.execute(
                    "UPDATE action_log SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1",
                    params![&id, reason],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let attempts: i64 =
                    conn.query_row("SELECT attempts FROM action_log WHERE id = ?1", params![&id], |row| row.get(0))?;
                Ok(Some(attempts.max(0) as u32))
            })
            .await
            .map_err(Error::from)
    }

    /// Move an action from the local log to the dead-letter list.
    ///
    /// Returns false if the id is not logged.
    pub async fn dead_letter_action(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let failed_at = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let moved = tx.execute(
                    "INSERT OR REPLACE INTO dead_letters
                        (id, action_type, action_data, created_at, attempts, last_error, failed_at)
                    SELECT id, action_type, action_data, created_at, attempts, last_error, ?2
                    FROM action_log WHERE id = ?1",
                    params![&id, failed_at],
                )?;
                tx.execute("DELETE FROM action_log WHERE id = ?1", params![&id])?;
                tx.commit()?;
                Ok(moved > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Actions that exhausted their replay attempts, oldest first.
    pub async fn dead_letters(&self) -> Result<Vec<LoggedAction>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<ActionRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, action_type, action_data, created_at, attempts, last_error
                    FROM dead_letters ORDER BY created_at ASC, id ASC",
                )?;
                Ok(read_rows(&mut stmt)?)
            })
            .await
            .map_err(Error::from)?;

        Ok(rows.into_iter().map(logged_from_row).collect())
    }

    /// Empty the local action log.
    pub async fn clear_action_log(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM action_log", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Wipe every store, the cache, the action log and the dead-letter list.
    pub async fn clear_all_local_data(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for table in ["record_indexes", "records", "cached_data", "action_log", "dead_letters"] {
                    tx.execute(&format!("DELETE FROM {table}"), [])?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn favorite(id: &str, place: &str, at: DateTime<Utc>) -> QueuedAction {
        QueuedAction::with_id(id, ActionPayload::Favorite { place_id: place.into() }, at)
    }

    #[tokio::test]
    async fn test_append_preserves_creation_order() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        db.append_action(&favorite("a", "p1", t0)).await.unwrap();
        db.append_action(&favorite("b", "p2", t0 + Duration::milliseconds(1)))
            .await
            .unwrap();
        db.append_action(&favorite("c", "p3", t0 + Duration::milliseconds(2)))
            .await
            .unwrap();

        let ids: Vec<String> = db.pending_actions().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(db.pending_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_same_timestamp_falls_back_to_insertion_order() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let t0 = Utc::now();
        db.append_action(&favorite("z", "p1", t0)).await.unwrap();
        db.append_action(&favorite("a", "p2", t0)).await.unwrap();

        let ids: Vec<String> = db.pending_actions().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_id_ignored() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let action = favorite("dup", "p1", Utc::now());
        assert!(db.append_action(&action).await.unwrap());
        assert!(!db.append_action(&action).await.unwrap());
        assert_eq!(db.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_logged_action_decodes() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let action = QueuedAction::new(ActionPayload::MissionProgress {
            mission_id: "m1".into(),
            progress: 3,
            completed: None,
        });
        db.append_action(&action).await.unwrap();

        let logged = db.pending_actions().await.unwrap();
        assert_eq!(logged[0].action_type, "mission_progress");
        let decoded = logged[0].decode().unwrap();
        assert_eq!(decoded.payload, action.payload);
        assert_eq!(decoded.created_at.timestamp_millis(), action.created_at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_logged_action_lookup() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let at = Utc::now();
        db.append_action(&favorite("a", "p1", at)).await.unwrap();

        let logged = db.logged_action("a").await.unwrap().unwrap();
        assert_eq!(logged.action_data, serde_json::json!({"place_id": "p1"}));
        assert_eq!(logged.created_at.timestamp_millis(), at.timestamp_millis());
        assert!(db.logged_action("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_actions_only_touches_given_ids() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let now = Utc::now();
        db.append_action(&favorite("a", "p1", now)).await.unwrap();
        db.append_action(&favorite("b", "p2", now)).await.unwrap();

        let removed = db.remove_actions(&["a".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_counting_and_dead_letter() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.append_action(&favorite("a", "p1", Utc::now())).await.unwrap();

        assert_eq!(db.record_action_failure("a", "timeout").await.unwrap(), Some(1));
        assert_eq!(db.record_action_failure("a", "conflict").await.unwrap(), Some(2));
        assert_eq!(db.record_action_failure("missing", "x").await.unwrap(), None);

        assert!(db.dead_letter_action("a").await.unwrap());
        assert_eq!(db.pending_count().await.unwrap(), 0);

        let dead = db.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
        assert_eq!(dead[0].last_error.as_deref(), Some("conflict"));
    }

    #[tokio::test]
    async fn test_clear_all_local_data() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.append_action(&favorite("a", "p1", Utc::now())).await.unwrap();
        db.append_action(&favorite("b", "p2", Utc::now())).await.unwrap();
        db.record_action_failure("b", "conflict").await.unwrap();
        db.dead_letter_action("b").await.unwrap();
        db.set_cache("k", &1, std::time::Duration::from_secs(60)).await.unwrap();

        db.clear_all_local_data().await.unwrap();

        assert_eq!(db.pending_count().await.unwrap(), 0);
        assert!(db.dead_letters().await.unwrap().is_empty());
        assert!(db.get_all_cache().await.unwrap().is_empty());

        // the connection is not left inside a transaction
        db.append_action(&favorite("c", "p3", Utc::now())).await.unwrap();
        db.clear_all_local_data().await.unwrap();
        assert_eq!(db.pending_count().await.unwrap(), 0);
    }
}
