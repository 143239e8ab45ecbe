//! store_* tool implementations.
//!
//! Refreshes and reads the local copies of missions, places and user
//! progress. Records are written wholesale; the store stamps `updatedAt`.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use roamsync_client::SyncEngine;
use roamsync_core::{Error, LocalDb, Mission, Place, StoreName, StoreRecord, UserProgress};

use super::json_result;

/// Parameters for the store_put tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StorePutParams {
    /// One of missions, places, userProgress.
    pub store: String,
    /// Records to write, each with an `id`.
    pub records: Vec<Value>,
}

/// Parameters for the store_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreGetParams {
    pub store: String,
    pub id: String,
}

/// Parameters for the store_query tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreQueryParams {
    pub store: String,
    /// Declared index to filter by (e.g. `city`); all records when absent.
    #[serde(default)]
    pub index: Option<String>,
    /// Index value to match; required with `index`.
    #[serde(default)]
    pub value: Option<String>,
}

/// Parameters for the store_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreDeleteParams {
    pub store: String,
    /// Record to delete; clears the whole store when absent.
    #[serde(default)]
    pub id: Option<String>,
}

/// Output of the store tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreOutput {
    pub store: String,
    #[serde(default)]
    pub records: Vec<Value>,
    /// Records written or deleted.
    #[serde(default)]
    pub affected: u64,
}

fn to_values<T: Serialize>(records: &[T]) -> Result<Vec<Value>, Error> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(Error::from))
        .collect()
}

async fn put_typed<T: StoreRecord>(db: &LocalDb, records: Vec<Value>) -> Result<Vec<Value>, Error> {
    let records = records
        .into_iter()
        .map(serde_json::from_value::<T>)
        .collect::<Result<Vec<_>, _>>()?;
    to_values(&db.put_all(&records).await?)
}

async fn get_typed<T: StoreRecord>(db: &LocalDb, id: &str) -> Result<Vec<Value>, Error> {
    to_values(&db.get::<T>(id).await?.into_iter().collect::<Vec<_>>())
}

async fn query_typed<T: StoreRecord>(db: &LocalDb, filter: Option<(&str, &str)>) -> Result<Vec<Value>, Error> {
    let records = match filter {
        Some((index, value)) => db.get_by_index::<T>(index, value).await?,
        None => db.get_all::<T>().await?,
    };
    to_values(&records)
}

/// Implementation of the store_put tool.
pub async fn put_impl(engine: &SyncEngine, params: StorePutParams) -> Result<CallToolResult, McpError> {
    let store: StoreName = params.store.parse()?;
    let db = engine.db();
    let records = match store {
        StoreName::Missions => put_typed::<Mission>(db, params.records).await?,
        StoreName::Places => put_typed::<Place>(db, params.records).await?,
        StoreName::UserProgress => put_typed::<UserProgress>(db, params.records).await?,
    };
    json_result(&StoreOutput { store: store.to_string(), affected: records.len() as u64, records })
}

/// Implementation of the store_get tool.
pub async fn get_impl(engine: &SyncEngine, params: StoreGetParams) -> Result<CallToolResult, McpError> {
    let store: StoreName = params.store.parse()?;
    let db = engine.db();
    let records = match store {
        StoreName::Missions => get_typed::<Mission>(db, &params.id).await?,
        StoreName::Places => get_typed::<Place>(db, &params.id).await?,
        StoreName::UserProgress => get_typed::<UserProgress>(db, &params.id).await?,
    };
    json_result(&StoreOutput { store: store.to_string(), records, affected: 0 })
}

/// Implementation of the store_query tool.
pub async fn query_impl(engine: &SyncEngine, params: StoreQueryParams) -> Result<CallToolResult, McpError> {
    let store: StoreName = params.store.parse()?;
    let filter = match (params.index.as_deref(), params.value.as_deref()) {
        (Some(index), Some(value)) => Some((index, value)),
        (None, None) => None,
        _ => return Err(Error::InvalidInput("index and value must be given together".into()).into()),
    };

    let db = engine.db();
    let records = match store {
        StoreName::Missions => query_typed::<Mission>(db, filter).await?,
        StoreName::Places => query_typed::<Place>(db, filter).await?,
        StoreName::UserProgress => query_typed::<UserProgress>(db, filter).await?,
    };
    json_result(&StoreOutput { store: store.to_string(), records, affected: 0 })
}

/// Implementation of the store_delete tool.
pub async fn delete_impl(engine: &SyncEngine, params: StoreDeleteParams) -> Result<CallToolResult, McpError> {
    let store: StoreName = params.store.parse()?;
    let db = engine.db();
    let affected = match (&params.id, store) {
        (None, _) => db.clear(store).await?,
        (Some(id), StoreName::Missions) => u64::from(db.delete::<Mission>(id).await?),
        (Some(id), StoreName::Places) => u64::from(db.delete::<Place>(id).await?),
        (Some(id), StoreName::UserProgress) => u64::from(db.delete::<UserProgress>(id).await?),
    };
    json_result(&StoreOutput { store: store.to_string(), records: vec![], affected })
}
