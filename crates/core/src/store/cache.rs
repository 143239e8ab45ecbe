//! Time-to-live cache built on the local database.
//!
//! Entries are overwritten wholesale and never patched. Expiry is enforced
//! lazily on read: an expired entry is deleted and reported as absent, so
//! the periodic sweep only bounds storage growth.

use super::connection::LocalDb;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached payload with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

type CacheRow = (String, String, i64, i64);

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn entry_from_row((key, payload, created_at, expires_at): CacheRow) -> Result<CacheEntry, Error> {
    Ok(CacheEntry {
        key,
        payload: serde_json::from_str(&payload)?,
        created_at: millis_to_datetime(created_at),
        expires_at: millis_to_datetime(expires_at),
    })
}

impl LocalDb {
    /// Write a cache entry that expires `ttl` from now.
    pub async fn set_cache<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<CacheEntry, Error> {
        if key.is_empty() {
            return Err(Error::InvalidInput("cache key cannot be empty".into()));
        }

        let payload = serde_json::to_value(value)?;
        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::InvalidInput(format!("ttl out of range: {e}")))?;
        let expires_at = created_at
            .checked_add_signed(ttl)
            .ok_or_else(|| Error::InvalidInput("ttl out of range".into()))?;

        let row: CacheRow =
            (key.to_string(), payload.to_string(), created_at.timestamp_millis(), expires_at.timestamp_millis());

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cached_data (key, payload, created_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![row.0, row.1, row.2, row.3],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheEntry { key: key.to_string(), payload, created_at, expires_at })
    }

    /// Read a cache entry, evicting it if it has expired.
    ///
    /// Returns None if the key is absent or expired.
    pub async fn get_cache_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        let now = Utc::now().timestamp_millis();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<CacheRow>, Error> {
                let result = conn.query_row(
                    "SELECT key, payload, created_at, expires_at FROM cached_data WHERE key = ?1",
                    params![&key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                );

                let row: CacheRow = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                if row.3 < now {
                    conn.execute("DELETE FROM cached_data WHERE key = ?1", params![&key])?;
                    tracing::debug!(key = %key, "evicted expired cache entry");
                    return Ok(None);
                }

                Ok(Some(row))
            })
            .await
            .map_err(Error::from)?;

        row.map(entry_from_row).transpose()
    }

    /// Read a cached value, deserialized into `T`.
    pub async fn get_cache<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.get_cache_entry(key).await? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.payload)?)),
            None => Ok(None),
        }
    }

    /// Every entry currently held in the cache table, expired or not.
    pub async fn get_all_cache(&self) -> Result<Vec<CacheEntry>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<CacheRow>, Error> {
                let mut stmt =
                    conn.prepare("SELECT key, payload, created_at, expires_at FROM cached_data ORDER BY key")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter().map(entry_from_row).collect()
    }

    /// Delete a single cache entry.
    pub async fn delete_cache(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cached_data WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every entry whose `expires_at <= now`.
    ///
    /// Returns the number of deleted entries.
    pub async fn cleanup_expired_cache(&self) -> Result<u64, Error> {
        let now = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cached_data WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every cache entry.
    pub async fn clear_cache(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cached_data", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
