//! PostgreSQL-backed [`CustodyStore`], gated behind the `postgres` feature.
//!
//! Stores every record in a single `custody_kv` table so the key/value
//! contract stays identical to [`crate::InMemoryStore`]; components never
//! know which one they're talking to.

use crate::{CustodyStore, DatabaseConfig, DbError, DbResult};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!(url = %config.postgres_url_masked(), "connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS custody_kv (
                key   TEXT PRIMARY KEY,
                value BYTEA NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl CustodyStore for PgStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO custody_kv (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM custody_kv WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn delete(&self, key: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM custody_kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<(String, Vec<u8>)>> {
        let pattern = format!("{}%", prefix);
        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT key, value FROM custody_kv WHERE key LIKE $1")
                .bind(pattern)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;
        let current: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM custody_kv WHERE key = $1 FOR UPDATE")
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.map(|(v,)| v);

        if current.as_deref() != expected {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO custody_kv (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(new_value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn claim_unique(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT INTO custody_kv (key, value) VALUES ($1, '') ON CONFLICT DO NOTHING",
        )
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
