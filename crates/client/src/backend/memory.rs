//! In-process backend.
//!
//! Holds tables as JSON rows and records every call, so tests and local
//! development can observe exactly which remote effects a pass produced.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{BackendError, Filter, RemoteBackend};

/// Kind of remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Insert,
    Update,
    Delete,
    Select,
}

/// One recorded call, including calls that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub op: BackendOp,
    pub table: String,
    pub filters: Vec<Filter>,
    pub body: Option<Value>,
}

/// Failure injected for calls matching an operation, a table and optionally a column value.
#[derive(Debug, Clone)]
struct FailureRule {
    op: BackendOp,
    table: String,
    column: Option<(String, String)>,
    error: BackendError,
}

impl FailureRule {
    fn applies(&self, call: &BackendCall) -> bool {
        if self.op != call.op || self.table != call.table {
            return false;
        }
        let Some((column, value)) = &self.column else {
            return true;
        };
        let probe = Filter::eq(column.clone(), value.clone());
        call.body.as_ref().is_some_and(|body| probe.matches(body)) || call.filters.contains(&probe)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    missing: HashSet<String>,
    failures: Vec<FailureRule>,
    calls: Vec<BackendCall>,
}

/// Backend that keeps every table in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to hold a pass open while another trigger arrives.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `table` absent: every call on it fails with `RelationNotFound`.
    pub fn drop_table(&self, table: &str) {
        self.lock().missing.insert(table.to_string());
    }

    /// Fail every `op` on `table`.
    pub fn fail_on(&self, op: BackendOp, table: &str, error: BackendError) {
        self.lock()
            .failures
            .push(FailureRule { op, table: table.to_string(), column: None, error });
    }

    /// Fail `op` on `table` when the row or a filter has `column == value`.
    pub fn fail_on_value(&self, op: BackendOp, table: &str, column: &str, value: &str, error: BackendError) {
        self.lock().failures.push(FailureRule {
            op,
            table: table.to_string(),
            column: Some((column.to_string(), value.to_string())),
            error,
        });
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Insert rows directly, without recording a call.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Current rows of a table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Calls of one kind against one table.
    pub fn calls_to(&self, op: BackendOp, table: &str) -> Vec<BackendCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.op == op && c.table == table)
            .cloned()
            .collect()
    }

    /// Record the call and return the error it should fail with, if any.
    async fn begin(&self, call: BackendCall) -> Result<(), BackendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        let table = call.table.clone();
        let injected = state.failures.iter().find(|rule| rule.applies(&call)).map(|rule| rule.error.clone());
        state.calls.push(call);

        if state.missing.contains(&table) {
            return Err(BackendError::RelationNotFound(table));
        }
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

/// Sort key that orders strings lexically and numbers numerically.
fn sort_key(value: Option<&Value>) -> (u8, f64, String) {
    match value {
        None | Some(Value::Null) => (0, 0.0, String::new()),
        Some(Value::Number(n)) => (1, n.as_f64().unwrap_or_default(), String::new()),
        Some(Value::String(s)) => (2, 0.0, s.clone()),
        Some(other) => (3, 0.0, other.to_string()),
    }
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn insert(&self, table: &str, row: Value) -> Result<(), BackendError> {
        let call = BackendCall { op: BackendOp::Insert, table: table.into(), filters: vec![], body: Some(row.clone()) };
        self.begin(call).await?;
        self.lock().tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    async fn update(&self, table: &str, filters: &[Filter], changes: Value) -> Result<(), BackendError> {
        let call = BackendCall {
            op: BackendOp::Update,
            table: table.into(),
            filters: filters.to_vec(),
            body: Some(changes.clone()),
        };
        self.begin(call).await?;

        let Value::Object(changes) = changes else {
            return Err(BackendError::Parse("update body must be an object".into()));
        };
        let mut state = self.lock();
        for row in state.tables.entry(table.to_string()).or_default().iter_mut() {
            if matches_all(row, filters)
                && let Value::Object(fields) = row
            {
                fields.extend(changes.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError> {
        let call = BackendCall { op: BackendOp::Delete, table: table.into(), filters: filters.to_vec(), body: None };
        self.begin(call).await?;
        if let Some(rows) = self.lock().tables.get_mut(table) {
            rows.retain(|row| !matches_all(row, filters));
        }
        Ok(())
    }

    async fn select(
        &self, table: &str, filters: &[Filter], order_by: Option<&str>,
    ) -> Result<Vec<Value>, BackendError> {
        let call = BackendCall { op: BackendOp::Select, table: table.into(), filters: filters.to_vec(), body: None };
        self.begin(call).await?;

        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| matches_all(row, filters))
            .collect();
        if let Some(column) = order_by {
            rows.sort_by(|a, b| {
                sort_key(a.get(column))
                    .partial_cmp(&sort_key(b.get(column)))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_select_and_call_log() {
        let backend = MemoryBackend::new();
        backend.insert("favorites", json!({"user_id": "u1", "place_id": "p1"})).await.unwrap();
        backend.insert("favorites", json!({"user_id": "u2", "place_id": "p2"})).await.unwrap();

        let rows = backend.select("favorites", &[Filter::eq("user_id", "u1")], None).await.unwrap();
        assert_eq!(rows, vec![json!({"user_id": "u1", "place_id": "p1"})]);
        assert_eq!(backend.calls_to(BackendOp::Insert, "favorites").len(), 2);
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_update_merges_columns() {
        let backend = MemoryBackend::new();
        backend.seed("user_missions", [json!({"user_id": "u1", "mission_id": "m1", "progress": 0})]);

        backend
            .update("user_missions", &[Filter::eq("mission_id", "m1")], json!({"progress": 3}))
            .await
            .unwrap();

        assert_eq!(backend.rows("user_missions")[0]["progress"], 3);
        assert_eq!(backend.rows("user_missions")[0]["user_id"], "u1");
    }

    #[tokio::test]
    async fn test_delete_matching_rows() {
        let backend = MemoryBackend::new();
        backend.seed(
            "favorites",
            [json!({"user_id": "u1", "place_id": "p1"}), json!({"user_id": "u1", "place_id": "p2"})],
        );

        let filters = [Filter::eq("user_id", "u1"), Filter::eq("place_id", "p1")];
        backend.delete("favorites", &filters).await.unwrap();

        assert_eq!(backend.rows("favorites"), vec![json!({"user_id": "u1", "place_id": "p2"})]);
    }

    #[tokio::test]
    async fn test_select_orders_by_column() {
        let backend = MemoryBackend::new();
        backend.seed(
            "offline_queue",
            [json!({"id": "b", "created_at": "2024-01-02"}), json!({"id": "a", "created_at": "2024-01-01"})],
        );

        let rows = backend.select("offline_queue", &[], Some("created_at")).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_dropped_table_reports_relation_not_found() {
        let backend = MemoryBackend::new();
        backend.drop_table("offline_queue");

        let err = backend.select("offline_queue", &[], None).await.unwrap_err();
        assert!(err.is_relation_missing());
        assert_eq!(backend.calls_to(BackendOp::Select, "offline_queue").len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection_by_value() {
        let backend = MemoryBackend::new();
        backend.fail_on_value(
            BackendOp::Insert,
            "favorites",
            "place_id",
            "bad",
            BackendError::Http { status: 409, code: None, message: "conflict".into() },
        );

        assert!(backend.insert("favorites", json!({"place_id": "bad"})).await.is_err());
        assert!(backend.insert("favorites", json!({"place_id": "good"})).await.is_ok());
        assert_eq!(backend.rows("favorites"), vec![json!({"place_id": "good"})]);

        backend.clear_failures();
        assert!(backend.insert("favorites", json!({"place_id": "bad"})).await.is_ok());
    }
}
