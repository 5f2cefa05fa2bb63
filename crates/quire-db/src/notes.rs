//! Note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgArguments;
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use quire_core::{
    new_v7, CreateNoteRequest, Error, Note, NotePatch, NoteRepository, Result, SearchTerms,
    VisibilityQuery, VisibleNotes,
};

use crate::escape_like;

const NOTE_COLUMNS: &str =
    "n.id, n.owner_id, n.title, n.content, n.tags, n.is_archived, n.created_at, n.updated_at";

/// Owned by `$1` or shared with `$1`. `EXISTS` keeps one row per note no
/// matter how many grants attach to it.
const VISIBLE_TO_USER: &str = "(n.owner_id = $1 OR EXISTS (
        SELECT 1 FROM shared_notes s WHERE s.note_id = n.id AND s.user_id = $1
    ))";

/// `$3` is the escaped ILIKE pattern, `$4` the tag terms.
const MATCHES_SEARCH: &str = "(n.title ILIKE $3 ESCAPE '\\'
        OR n.content ILIKE $3 ESCAPE '\\'
        OR n.tags && $4::text[])";

/// PostgreSQL implementation of NoteRepository.
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// WHERE clause shared by the page query and the count query.
    fn visibility_filter(search: Option<&SearchTerms>) -> String {
        let mut clause = format!("{} AND n.is_archived = $2", VISIBLE_TO_USER);
        if search.is_some() {
            clause.push_str(" AND ");
            clause.push_str(MATCHES_SEARCH);
        }
        clause
    }
}

/// Bind the search parameters (`$3`, `$4`) when a search is present.
macro_rules! bind_search {
    ($q:expr, $search:expr) => {{
        let mut q = $q;
        if let Some(search) = $search {
            q = q
                .bind(format!("%{}%", escape_like(&search.text)))
                .bind(search.terms.clone());
        }
        q
    }};
}

fn note_query<'q>(sql: &'q str) -> QueryAs<'q, Postgres, Note, PgArguments> {
    sqlx::query_as::<_, Note>(sql)
}

fn count_query<'q>(sql: &'q str) -> QueryScalar<'q, Postgres, i64, PgArguments> {
    sqlx::query_scalar::<_, i64>(sql)
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Note> {
        let now = Utc::now();
        sqlx::query_as::<_, Note>(
            "INSERT INTO notes (id, owner_id, title, content, tags, is_archived, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6)
             RETURNING id, owner_id, title, content, tags, is_archived, created_at, updated_at",
        )
        .bind(new_v7())
        .bind(owner_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.tags)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Error::NotFound("User not found".to_string())
            }
            e => Error::Database(e),
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>> {
        let sql = format!("SELECT {} FROM notes n WHERE n.id = $1", NOTE_COLUMNS);
        note_query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn update(&self, id: Uuid, patch: &NotePatch) -> Result<Option<Note>> {
        // Absent fields bind NULL and keep the stored value.
        sqlx::query_as::<_, Note>(
            "UPDATE notes SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                tags = COALESCE($4, tags),
                is_archived = COALESCE($5, is_archived),
                updated_at = $6
             WHERE id = $1
             RETURNING id, owner_id, title, content, tags, is_archived, created_at, updated_at",
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.content.as_deref())
        .bind(patch.tags.clone())
        .bind(patch.is_archived)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn list_visible(&self, query: &VisibilityQuery) -> Result<VisibleNotes> {
        let filter = Self::visibility_filter(query.search.as_ref());
        let (limit_idx, offset_idx) = if query.search.is_some() {
            (5, 6)
        } else {
            (3, 4)
        };

        let page_sql = format!(
            "SELECT {} FROM notes n WHERE {}
             ORDER BY n.updated_at DESC, n.id DESC
             LIMIT ${} OFFSET ${}",
            NOTE_COLUMNS, filter, limit_idx, offset_idx
        );
        let count_sql = format!("SELECT COUNT(*) FROM notes n WHERE {}", filter);

        let page = note_query(&page_sql)
            .bind(query.user_id)
            .bind(query.is_archived);
        let notes = bind_search!(page, query.search.as_ref())
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let count = count_query(&count_sql)
            .bind(query.user_id)
            .bind(query.is_archived);
        let total = bind_search!(count, query.search.as_ref())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "list_visible",
            user_id = %query.user_id,
            result_count = notes.len(),
            total_count = total,
            "Visible notes query"
        );
        Ok(VisibleNotes { notes, total })
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM notes WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;
        if locked.is_none() {
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(false);
        }

        let grants = sqlx::query("DELETE FROM shared_notes WHERE note_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "delete_cascade",
            note_id = %id,
            grants_removed = grants,
            "Note and grants deleted"
        );
        Ok(true)
    }
}
