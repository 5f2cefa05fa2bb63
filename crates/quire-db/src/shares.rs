//! Share grant repository implementation.
//!
//! Uniqueness of (note, user) is enforced by the `shared_notes` unique
//! constraint; inserts use `ON CONFLICT DO NOTHING` so a lost race is
//! reported as `AlreadyShared` rather than a database error.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use quire_core::{new_v7, Error, Permission, Result, ShareGrant, ShareRepository};

const GRANT_COLUMNS: &str = "id, note_id, user_id, permission, created_at, updated_at";

/// Name of the foreign key from `shared_notes.user_id` to `users.id`.
const USER_FK: &str = "shared_notes_user_id_fkey";

/// PostgreSQL implementation of ShareRepository.
pub struct PgShareRepository {
    pool: Pool<Postgres>,
}

impl PgShareRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map a `shared_notes` row, rejecting permission values outside the enum.
fn map_row_to_grant(row: &PgRow) -> Result<ShareGrant> {
    let permission: String = row.try_get("permission").map_err(Error::Database)?;
    Ok(ShareGrant {
        id: row.try_get("id").map_err(Error::Database)?,
        note_id: row.try_get("note_id").map_err(Error::Database)?,
        user_id: row.try_get("user_id").map_err(Error::Database)?,
        permission: permission
            .parse::<Permission>()
            .map_err(|_| Error::Internal(format!("stored permission {:?} is invalid", permission)))?,
        created_at: row.try_get("created_at").map_err(Error::Database)?,
        updated_at: row.try_get("updated_at").map_err(Error::Database)?,
    })
}

/// Translate a failed grant insert into the domain error.
fn map_insert_error(e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return Error::AlreadyShared("Note is already shared with this user".to_string());
        }
        if db.is_foreign_key_violation() {
            return if db.constraint() == Some(USER_FK) {
                Error::NotFound("User not found".to_string())
            } else {
                Error::NotFound("Note not found".to_string())
            };
        }
    }
    Error::Database(e)
}

#[async_trait]
impl ShareRepository for PgShareRepository {
    async fn find(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<ShareGrant>> {
        let sql = format!(
            "SELECT {} FROM shared_notes WHERE note_id = $1 AND user_id = $2",
            GRANT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(note_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_grant).transpose()
    }

    async fn insert(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<ShareGrant> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO shared_notes (id, note_id, user_id, permission, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             ON CONFLICT (note_id, user_id) DO NOTHING
             RETURNING {}",
            GRANT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(new_v7())
            .bind(note_id)
            .bind(user_id)
            .bind(permission.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_insert_error)?;

        match row {
            Some(row) => map_row_to_grant(&row),
            None => {
                debug!(
                    subsystem = "database",
                    component = "shares",
                    op = "insert",
                    note_id = %note_id,
                    user_id = %user_id,
                    "Grant already exists"
                );
                Err(Error::AlreadyShared(
                    "Note is already shared with this user".to_string(),
                ))
            }
        }
    }

    async fn update_permission(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Option<ShareGrant>> {
        let sql = format!(
            "UPDATE shared_notes SET permission = $3, updated_at = $4
             WHERE note_id = $1 AND user_id = $2
             RETURNING {}",
            GRANT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(note_id)
            .bind(user_id)
            .bind(permission.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(map_row_to_grant).transpose()
    }

    async fn delete(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shared_notes WHERE note_id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_notes(&self, note_ids: &[Uuid]) -> Result<Vec<ShareGrant>> {
        if note_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM shared_notes
             WHERE note_id = ANY($1)
             ORDER BY created_at ASC, id ASC",
            GRANT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(note_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(map_row_to_grant).collect()
    }
}
