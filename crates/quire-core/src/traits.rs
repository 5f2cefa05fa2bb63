//! Core traits for quire storage abstractions.
//!
//! These traits define the interfaces that concrete stores must satisfy.
//! `quire-db` implements them on PostgreSQL; [`crate::mock::MemoryStore`]
//! implements them in process for tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;
use crate::search::SearchTerms;

// =============================================================================
// NOTE REPOSITORY
// =============================================================================

/// Query over the notes visible to one user.
///
/// Visible means owned by the user or shared with the user through a grant.
#[derive(Debug, Clone)]
pub struct VisibilityQuery {
    pub user_id: Uuid,
    pub is_archived: bool,
    /// Optional text filter; `None` lists everything visible.
    pub search: Option<SearchTerms>,
    pub limit: i64,
    pub offset: i64,
}

/// A page of visible notes plus the total before pagination.
#[derive(Debug, Clone, Default)]
pub struct VisibleNotes {
    /// Ordered by `updated_at` descending, then id descending. Each note
    /// appears at most once.
    pub notes: Vec<Note>,
    pub total: i64,
}

/// Durable store of notes.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note owned by `owner_id`.
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch a note by ID.
    async fn fetch(&self, id: Uuid) -> Result<Option<Note>>;

    /// Apply a partial update and bump `updated_at`.
    ///
    /// Returns `None` if the note does not exist.
    async fn update(&self, id: Uuid, patch: &NotePatch) -> Result<Option<Note>>;

    /// List notes visible to a user.
    async fn list_visible(&self, query: &VisibilityQuery) -> Result<VisibleNotes>;

    /// Delete all grants of a note and then the note, atomically.
    ///
    /// Returns `false` if the note did not exist.
    async fn delete_cascade(&self, id: Uuid) -> Result<bool>;
}

// =============================================================================
// SHARE REPOSITORY
// =============================================================================

/// Durable registry of share grants, at most one per (note, user).
#[async_trait]
pub trait ShareRepository: Send + Sync {
    /// Look up the grant for a (note, user) pair.
    async fn find(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<ShareGrant>>;

    /// Create a grant.
    ///
    /// Uniqueness is enforced by the store: if a grant for the pair already
    /// exists this fails with `Error::AlreadyShared`, also when racing another
    /// insert. Fails with `Error::NotFound` if the note no longer exists.
    async fn insert(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<ShareGrant>;

    /// Overwrite the permission of an existing grant and bump its
    /// `updated_at`. Returns `None` if no grant exists.
    async fn update_permission(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Option<ShareGrant>>;

    /// Delete the grant for a pair. Returns whether a row was removed.
    async fn delete(&self, note_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// All grants for the given notes, oldest first.
    async fn list_for_notes(&self, note_ids: &[Uuid]) -> Result<Vec<ShareGrant>>;
}

// =============================================================================
// USER DIRECTORY
// =============================================================================

/// Read-only access to user summaries owned by the identity provider.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Summaries for the given users. Unknown ids are skipped.
    async fn fetch_summaries(&self, user_ids: &[Uuid]) -> Result<Vec<UserSummary>>;

    /// Check if a user exists.
    async fn exists(&self, user_id: Uuid) -> Result<bool>;
}
