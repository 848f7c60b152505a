//! SQLite expiring key-value store implementation.
//!
//! Implements `ExpiringKvStore` from `inkwell-core` using sqlx with split
//! read/write pools. Expiry is an `expires_at` unix timestamp column:
//! expired rows are treated as absent on read and reset by the next
//! write. The atomic increment is one upsert with `RETURNING`, serialized
//! by the single-connection writer pool.

use std::time::Duration;

use chrono::Utc;
use sqlx::Row;

use inkwell_core::storage::ExpiringKvStore;
use inkwell_types::error::StoreError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ExpiringKvStore`.
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    /// Create a new KV store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn expiry_timestamp(ttl: Duration) -> i64 {
    Utc::now().timestamp() + ttl.as_secs() as i64
}

impl ExpiringKvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Utc::now().timestamp();
        let row = sqlx::query(
            "SELECT value FROM kv_entries WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_err)?;

        match row {
            Some(row) => {
                let value: String = row.try_get("value").map_err(map_err)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO kv_entries (key, value, expires_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_timestamp(ttl))
        .execute(&self.pool.writer)
        .await
        .map_err(map_err)?;

        Ok(())
    }

    async fn incr_by_ex(&self, key: &str, delta: u64, ttl: Duration) -> Result<u64, StoreError> {
        let now = Utc::now().timestamp();
        let fresh_expiry = expiry_timestamp(ttl);
        let delta = delta as i64;

        // An expired row restarts at `delta` with a fresh expiry; a live
        // row accumulates and keeps its original expiry.
        let row = sqlx::query(
            r#"INSERT INTO kv_entries (key, value, expires_at)
               VALUES (?1, CAST(?2 AS TEXT), ?3)
               ON CONFLICT (key) DO UPDATE SET
                   value = CAST(
                       CASE
                           WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= ?4
                               THEN ?2
                           ELSE CAST(kv_entries.value AS INTEGER) + ?2
                       END AS TEXT),
                   expires_at = CASE
                       WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= ?4
                           THEN ?3
                       ELSE kv_entries.expires_at
                   END
               RETURNING CAST(value AS INTEGER) AS total"#,
        )
        .bind(key)
        .bind(delta)
        .bind(fresh_expiry)
        .bind(now)
        .fetch_one(&self.pool.writer)
        .await
        .map_err(map_err)?;

        let total: i64 = row.try_get("total").map_err(map_err)?;
        Ok(total.max(0) as u64)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(map_err)?;

        Ok(())
    }
}
