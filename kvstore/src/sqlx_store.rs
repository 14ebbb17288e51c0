use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tracing::instrument;

use crate::{ConditionalStore, Expectation, KvError, StoredRecord};

/// `ConditionalStore` backed by `sqlx::AnyPool` (sqlite or postgres), using
/// `AnyPoolOptions` over a single generic table with an explicit
/// `migrate()` call rather than a build-time migration macro.
pub struct SqlxKvStore {
    pool: AnyPool,
}

impl SqlxKvStore {
    pub async fn connect(database_url: &str) -> Result<Self, KvError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), KvError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_records (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                version BIGINT NOT NULL,
                expires_at_ms BIGINT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[async_trait::async_trait]
impl ConditionalStore for SqlxKvStore {
    #[instrument(skip(self), fields(key))]
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, KvError> {
        let row = sqlx::query("SELECT value, version, expires_at_ms FROM kv_records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| StoredRecord {
            value: r.get::<Vec<u8>, _>("value"),
            version: r.get::<i64, _>("version"),
            expires_at: r
                .get::<Option<i64>, _>("expires_at_ms")
                .and_then(|ms| DateTime::from_timestamp_millis(ms)),
        }))
    }

    #[instrument(skip(self, value), fields(key, value_len = value.len()))]
    async fn put_if(
        &self,
        key: &str,
        expect: Expectation,
        value: Vec<u8>,
        ttl: Option<DateTime<Utc>>,
    ) -> Result<i64, KvError> {
        let ttl_ms = ttl.map(|t| t.timestamp_millis());

        let affected = match expect {
            Expectation::AbsentOrExpired => {
                let now = Self::now_ms();
                sqlx::query(
                    r#"
                    INSERT INTO kv_records (key, value, version, expires_at_ms)
                    VALUES (?, ?, 1, ?)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        version = kv_records.version + 1,
                        expires_at_ms = excluded.expires_at_ms
                    WHERE kv_records.expires_at_ms IS NOT NULL AND kv_records.expires_at_ms < ?
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(ttl_ms)
                .bind(now)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
            Expectation::Version(expected) => {
                sqlx::query(
                    r#"
                    UPDATE kv_records
                    SET value = ?, version = version + 1, expires_at_ms = ?
                    WHERE key = ? AND version = ?
                    "#,
                )
                .bind(&value)
                .bind(ttl_ms)
                .bind(key)
                .bind(expected)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            return Err(KvError::VersionMismatch(key.to_string()));
        }

        // `AnyPool` does not give us a backend-uniform `RETURNING`, so a
        // follow-up read is the simplest correct way to report the new
        // version. Not on the hot path (lock acquire/renew, health update).
        let record = self
            .get(key)
            .await?
            .ok_or_else(|| KvError::VersionMismatch(key.to_string()))?;
        Ok(record.version)
    }

    #[instrument(skip(self), fields(key, expected_version))]
    async fn delete_if(&self, key: &str, expected_version: i64) -> Result<(), KvError> {
        let affected = sqlx::query("DELETE FROM kv_records WHERE key = ? AND version = ?")
            .bind(key)
            .bind(expected_version)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            // Distinguish "already gone" (no-op, per spec's release contract)
            // from "present but at a different version" (a real conflict).
            if self.get(key).await?.is_none() {
                return Ok(());
            }
            return Err(KvError::VersionMismatch(key.to_string()));
        }
        Ok(())
    }
}
