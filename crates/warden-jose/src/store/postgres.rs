//! Postgres-backed [`TokenStore`] for multi-node deployments.
//!
//! One row per issued refresh token, keyed by the compact form. Atomicity
//! of [`TokenStore::invalidate_token`] falls out of `DELETE .. RETURNING`:
//! the row can only be deleted once, so exactly one racing caller sees it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashSet;

use crate::error::SecurityError;
use crate::store::{TokenRecord, TokenStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS refresh_tokens (
    token      TEXT PRIMARY KEY,
    subject    TEXT NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS refresh_tokens_subject_idx ON refresh_tokens (subject);
"#;

pub struct PostgresTokenStore {
    pool: PgPool,
}

impl PostgresTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table and index if they do not exist.
    pub async fn migrate(&self) -> Result<(), SecurityError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn store_token(&self, record: TokenRecord) -> Result<(), SecurityError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token, subject, expires_at) \
             VALUES ($1, $2, $3) ON CONFLICT (token) DO NOTHING",
        )
        .bind(record.token())
        .bind(record.subject())
        .bind(record.expires_at())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_tokens(&self, subject: &str) -> Result<HashSet<TokenRecord>, SecurityError> {
        let rows = sqlx::query(
            "SELECT token, subject, expires_at FROM refresh_tokens \
             WHERE subject = $1 AND expires_at > now()",
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(TokenRecord::new(
                    row.try_get::<String, _>("token").map_err(store_err)?,
                    row.try_get::<String, _>("subject").map_err(store_err)?,
                    row.try_get::<DateTime<Utc>, _>("expires_at")
                        .map_err(store_err)?,
                ))
            })
            .collect()
    }

    async fn invalidate_token(&self, token: &str) -> Result<bool, SecurityError> {
        // Deleting unconditionally also reaps the row when it has expired;
        // the return value only reports a live record.
        let row = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1 RETURNING expires_at")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        match row {
            Some(row) => {
                let expires_at: DateTime<Utc> =
                    row.try_get("expires_at").map_err(store_err)?;
                Ok(expires_at > Utc::now())
            }
            None => Ok(false),
        }
    }

    async fn invalidate_all_tokens(&self, subject: &str) -> Result<(), SecurityError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE subject = $1")
            .bind(subject)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> SecurityError {
    SecurityError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    // Exercised manually against a disposable database:
    //   WARDEN_TEST_DATABASE_URL=postgres://.. cargo test -p warden-jose --features postgres -- --ignored
    #[tokio::test]
    #[ignore = "needs a live postgres, set WARDEN_TEST_DATABASE_URL"]
    async fn roundtrip_against_live_database() {
        let url = std::env::var("WARDEN_TEST_DATABASE_URL").expect("WARDEN_TEST_DATABASE_URL");
        let pool = PgPool::connect(&url).await.expect("connect");
        let store = PostgresTokenStore::new(pool);
        store.migrate().await.expect("migrate");

        let record = TokenRecord::new("pg-t1", "alice", Utc::now() + Duration::seconds(60));
        store.store_token(record).await.unwrap();
        assert_eq!(store.get_tokens("alice").await.unwrap().len(), 1);

        assert!(store.invalidate_token("pg-t1").await.unwrap());
        assert!(!store.invalidate_token("pg-t1").await.unwrap());
        store.invalidate_all_tokens("alice").await.unwrap();
        assert!(store.get_tokens("alice").await.unwrap().is_empty());
    }
}
