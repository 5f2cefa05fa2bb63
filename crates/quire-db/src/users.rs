//! User directory implementation.
//!
//! Users are owned by the identity provider; this repository only reads
//! summaries, plus an `insert` used to seed fixtures and local setups.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use quire_core::{new_v7, Error, Result, UserDirectory, UserSummary};

/// PostgreSQL implementation of UserDirectory.
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Register a user. Fails with `InvalidInput` if the username or email is
    /// already taken.
    pub async fn insert(&self, username: &str, email: &str) -> Result<UserSummary> {
        sqlx::query_as::<_, UserSummary>(
            "INSERT INTO users (id, username, email, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, username, email",
        )
        .bind(new_v7())
        .bind(username)
        .bind(email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::InvalidInput(format!("user {} already exists", username))
            }
            e => Error::Database(e),
        })
    }
}

#[async_trait]
impl UserDirectory for PgUserRepository {
    async fn fetch_summaries(&self, user_ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, email FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn exists(&self, user_id: Uuid) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}
