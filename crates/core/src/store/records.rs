//! Record store CRUD operations.
//!
//! Domain records are written wholesale as JSON documents. Every write
//! stamps `updatedAt` with the local time and recomputes the store's
//! secondary index projections in the same transaction.

use super::connection::LocalDb;
use super::schema::StoreName;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A record that lives in one of the named stores, keyed by `id`.
pub trait StoreRecord: Serialize + DeserializeOwned + Send + 'static {
    /// Store that owns records of this type.
    const STORE: StoreName;

    /// Primary key, unique within the store.
    fn id(&self) -> &str;
}

/// Project a JSON field into its index key. Missing and null fields are not indexed.
fn index_value(field: &Value) -> Option<String> {
    match field {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, Error> {
    serde_json::from_str(raw).map_err(Error::from)
}

/// A record ready to be written: stamped document plus index projections.
struct PreparedRecord {
    id: String,
    data: String,
    projections: Vec<(&'static str, String)>,
}

fn prepare<T: StoreRecord>(record: &T, now: DateTime<Utc>) -> Result<(PreparedRecord, T), Error> {
    let id = record.id().to_string();
    if id.is_empty() {
        return Err(Error::InvalidInput(format!("{} record id cannot be empty", T::STORE)));
    }

    let mut doc = serde_json::to_value(record)?;
    let Value::Object(fields) = &mut doc else {
        return Err(Error::Serialization(format!("{} records must serialize to objects", T::STORE)));
    };
    fields.insert("updatedAt".into(), Value::String(now.to_rfc3339()));

    let projections = T::STORE
        .indexes()
        .iter()
        .filter_map(|index| fields.get(*index).and_then(index_value).map(|v| (*index, v)))
        .collect();

    let data = doc.to_string();
    let stored: T = decode(&data)?;
    Ok((PreparedRecord { id, data, projections }, stored))
}

impl LocalDb {
    /// Insert or replace a record, stamping `updatedAt`.
    ///
    /// Returns the record as stored.
    pub async fn put<T: StoreRecord>(&self, record: &T) -> Result<T, Error> {
        let now = Utc::now();
        let (prepared, stored) = prepare(record, now)?;
        self.write_records(T::STORE, vec![prepared], now).await?;
        Ok(stored)
    }

    /// Write several records of the same store in one transaction, e.g. a
    /// refreshed catalog page. Either every record is written or none is.
    pub async fn put_all<T: StoreRecord>(&self, records: &[T]) -> Result<Vec<T>, Error> {
        let now = Utc::now();
        let (prepared, stored): (Vec<PreparedRecord>, Vec<T>) = records
            .iter()
            .map(|record| prepare(record, now))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unzip();
        if !prepared.is_empty() {
            self.write_records(T::STORE, prepared, now).await?;
        }
        Ok(stored)
    }

    async fn write_records(
        &self, store: StoreName, records: Vec<PreparedRecord>, now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let store = store.as_str();
        let updated_at = now.timestamp_millis();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for record in &records {
                    tx.execute(
                        "INSERT INTO records (store, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(store, id) DO UPDATE SET
                            data = excluded.data,
                            updated_at = excluded.updated_at",
                        params![store, &record.id, &record.data, updated_at],
                    )?;
                    tx.execute(
                        "DELETE FROM record_indexes WHERE store = ?1 AND id = ?2",
                        params![store, &record.id],
                    )?;
                    for (index_name, value) in &record.projections {
                        tx.execute(
                            "INSERT INTO record_indexes (store, index_name, value, id) VALUES (?1, ?2, ?3, ?4)",
                            params![store, index_name, value, &record.id],
                        )?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a record by id.
    ///
    /// Returns None if the id doesn't exist in the store.
    pub async fn get<T: StoreRecord>(&self, id: &str) -> Result<Option<T>, Error> {
        let id = id.to_string();
        let store = T::STORE.as_str();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT data FROM records WHERE store = ?1 AND id = ?2",
                    params![store, id],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(data) => Ok(Some(data)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.as_deref().map(decode::<T>).transpose()
    }

    /// Get every record in the store, ordered by id.
    pub async fn get_all<T: StoreRecord>(&self) -> Result<Vec<T>, Error> {
        let store = T::STORE.as_str();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT data FROM records WHERE store = ?1 ORDER BY id")?;
                let rows = stmt
                    .query_map(params![store], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.iter().map(|raw| decode(raw)).collect()
    }

    /// Get records whose index projection equals `value`.
    pub async fn get_by_index<T: StoreRecord>(&self, index: &str, value: &str) -> Result<Vec<T>, Error> {
        let index = T::STORE.index(index)?;
        let value = value.to_string();
        let store = T::STORE.as_str();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT r.data FROM record_indexes i
                    JOIN records r ON r.store = i.store AND r.id = i.id
                    WHERE i.store = ?1 AND i.index_name = ?2 AND i.value = ?3
                    ORDER BY r.id",
                )?;
                let rows = stmt
                    .query_map(params![store, index, value], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.iter().map(|raw| decode(raw)).collect()
    }

    /// Delete a record by id.
    ///
    /// Returns true if a record was removed.
    pub async fn delete<T: StoreRecord>(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let store = T::STORE.as_str();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM records WHERE store = ?1 AND id = ?2", params![store, id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every record in a store.
    ///
    /// Returns the number of deleted records.
    pub async fn clear(&self, store: StoreName) -> Result<u64, Error> {
        let store = store.as_str();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM records WHERE store = ?1", params![store])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of records in a store.
    pub async fn count(&self, store: StoreName) -> Result<u64, Error> {
        let store = store.as_str();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM records WHERE store = ?1", params![store], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mission, Place, UserProgress};

    fn make_place(id: &str, city: &str, category: &str) -> Place {
        Place {
            id: id.to_string(),
            name: format!("Place {id}"),
            city: city.to_string(),
            category: category.to_string(),
            latitude: None,
            longitude: None,
            updated_at: None,
        }
    }

    fn make_mission(id: &str, city: &str) -> Mission {
        Mission {
            id: id.to_string(),
            title: format!("Mission {id}"),
            description: None,
            city: city.to_string(),
            country: "FR".to_string(),
            place_ids: vec![],
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let place = make_place("p1", "Paris", "museum");

        let stored = db.put(&place).await.unwrap();
        assert!(stored.updated_at.is_some());

        let retrieved = db.get::<Place>("p1").await.unwrap().unwrap();
        assert_eq!(retrieved.name, place.name);
        assert_eq!(retrieved.updated_at, stored.updated_at);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = LocalDb::open_in_memory().await.unwrap();
        assert!(db.get::<Mission>("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put(&make_place("shared", "Paris", "park")).await.unwrap();

        assert!(db.get::<Mission>("shared").await.unwrap().is_none());
        assert_eq!(db.count(StoreName::Places).await.unwrap(), 1);
        assert_eq!(db.count(StoreName::Missions).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_by_index() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put_all(&[
            make_place("p1", "Paris", "museum"),
            make_place("p2", "Paris", "park"),
            make_place("p3", "Lyon", "museum"),
        ])
        .await
        .unwrap();

        let paris = db.get_by_index::<Place>("city", "Paris").await.unwrap();
        assert_eq!(paris.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["p1", "p2"]);

        let museums = db.get_by_index::<Place>("category", "museum").await.unwrap();
        assert_eq!(museums.len(), 2);

        let err = db.get_by_index::<Place>("country", "FR").await;
        assert!(matches!(err, Err(Error::UnknownIndex { .. })));
    }

    #[tokio::test]
    async fn test_put_all_writes_nothing_when_a_record_is_invalid() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put(&make_place("p1", "Paris", "museum")).await.unwrap();

        let result = db
            .put_all(&[make_place("p1", "Lyon", "museum"), make_place("", "Lyon", "park")])
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(db.get::<Place>("p1").await.unwrap().unwrap().city, "Paris");
        assert!(db.get_by_index::<Place>("city", "Lyon").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_all_returns_stamped_records() {
        let db = LocalDb::open_in_memory().await.unwrap();

        let stored = db
            .put_all(&[make_mission("m1", "Paris"), make_mission("m2", "Lyon")])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|m| m.updated_at.is_some()));
        assert!(db.put_all::<Mission>(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_recomputed_on_overwrite() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put(&make_mission("m1", "Paris")).await.unwrap();
        db.put(&make_mission("m1", "Lyon")).await.unwrap();

        assert!(db.get_by_index::<Mission>("city", "Paris").await.unwrap().is_empty());
        assert_eq!(db.get_by_index::<Mission>("city", "Lyon").await.unwrap().len(), 1);
        assert_eq!(db.get_all::<Mission>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_numeric_fields_not_indexed_unless_declared() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let progress = UserProgress {
            id: "u1:m1".to_string(),
            mission_id: "m1".to_string(),
            user_id: "u1".to_string(),
            progress: 2,
            completed: false,
            updated_at: None,
        };
        db.put(&progress).await.unwrap();

        let by_mission = db.get_by_index::<UserProgress>("missionId", "m1").await.unwrap();
        assert_eq!(by_mission.len(), 1);
        assert_eq!(by_mission[0].progress, 2);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let db = LocalDb::open_in_memory().await.unwrap();
        db.put(&make_place("p1", "Paris", "museum")).await.unwrap();
        db.put(&make_place("p2", "Paris", "park")).await.unwrap();

        assert!(db.delete::<Place>("p1").await.unwrap());
        assert!(!db.delete::<Place>("p1").await.unwrap());
        assert!(db.get_by_index::<Place>("category", "museum").await.unwrap().is_empty());

        assert_eq!(db.clear(StoreName::Places).await.unwrap(), 1);
        assert!(db.get_all::<Place>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_empty_id() {
        let db = LocalDb::open_in_memory().await.unwrap();
        let result = db.put(&make_place("", "Paris", "museum")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
