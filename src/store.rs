//! `LogStore` and `CredentialStore`: the persisted-state interfaces the core
//! depends on but does not own the schema or migrations for (spec §1, §6).
//!
//! The teacher's `repo/*.rs` modules use `sqlx::query!`/`query_as!`, which
//! verify the SQL against a live database (or an `.sqlx` offline cache) at
//! compile time. Neither is available in this build, so these implementations
//! use the runtime-checked `sqlx::query_as` / `sqlx::query` forms instead —
//! same crate, same pool, no compile-time DB dependency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::PgPool;

pub const STREAMED_BODY_SENTINEL: &str = "[streamed response: body streamed directly to client]";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestLog {
    pub id: i64,
    pub hostname: String,
    pub path: String,
    pub method: String,
    pub request_headers: Json,
    pub request_body: String,
    pub response_status: Option<i32>,
    pub response_headers: Json,
    pub response_body: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when recording a completed exchange; `id`/`created_at` are
/// store-assigned.
#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub hostname: String,
    pub path: String,
    pub method: String,
    pub request_headers: Json,
    pub request_body: String,
    pub response_status: Option<i32>,
    pub response_headers: Json,
    pub response_body: String,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    async fn insert(&self, log: NewRequestLog) -> Result<RequestLog, sqlx::Error>;
    async fn find_recent_by_hostname(
        &self,
        hostname: &str,
        limit: i64,
    ) -> Result<Vec<RequestLog>, sqlx::Error>;
    async fn find_by_id(&self, id: i64) -> Result<Option<RequestLog>, sqlx::Error>;
    async fn delete_by_hostname(&self, hostname: &str) -> Result<u64, sqlx::Error>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn upsert(&self, hostname: &str, password: &str) -> Result<(), sqlx::Error>;
    async fn get(&self, hostname: &str) -> Result<Option<String>, sqlx::Error>;
}

pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    async fn insert(&self, log: NewRequestLog) -> Result<RequestLog, sqlx::Error> {
        sqlx::query_as::<_, RequestLog>(
            r#"INSERT INTO request_logs
                 (hostname, path, method, request_headers, request_body,
                  response_status, response_headers, response_body, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
               RETURNING id, hostname, path, method, request_headers, request_body,
                         response_status, response_headers, response_body, created_at"#,
        )
        .bind(log.hostname)
        .bind(log.path)
        .bind(log.method)
        .bind(log.request_headers)
        .bind(log.request_body)
        .bind(log.response_status)
        .bind(log.response_headers)
        .bind(log.response_body)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_recent_by_hostname(
        &self,
        hostname: &str,
        limit: i64,
    ) -> Result<Vec<RequestLog>, sqlx::Error> {
        sqlx::query_as::<_, RequestLog>(
            r#"SELECT id, hostname, path, method, request_headers, request_body,
                      response_status, response_headers, response_body, created_at
               FROM request_logs
               WHERE hostname = $1
               ORDER BY created_at DESC, id DESC
               LIMIT $2"#,
        )
        .bind(hostname)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RequestLog>, sqlx::Error> {
        sqlx::query_as::<_, RequestLog>(
            r#"SELECT id, hostname, path, method, request_headers, request_body,
                      response_status, response_headers, response_body, created_at
               FROM request_logs
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_by_hostname(&self, hostname: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM request_logs WHERE hostname = $1")
            .bind(hostname)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM request_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn upsert(&self, hostname: &str, password: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO request_log_credentials (hostname, password, updated_at)
               VALUES ($1, $2, now())
               ON CONFLICT (hostname) DO UPDATE SET password = EXCLUDED.password, updated_at = now()"#,
        )
        .bind(hostname)
        .bind(password)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, hostname: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password FROM request_log_credentials WHERE hostname = $1")
                .bind(hostname)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(password,)| password))
    }
}
