//! Note service: orchestration of note CRUD, listing, search and sharing.
//!
//! Every authorization decision is delegated to [`AccessControl`]. Views are
//! assembled with batched secondary fetches (one query for the grants of all
//! notes on a page, one for the user summaries) so the query count does not
//! grow with the page size.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::AccessControl;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::models::*;
use crate::search::SearchTerms;
use crate::traits::{NoteRepository, ShareRepository, UserDirectory, VisibilityQuery};

/// Note service, constructed once at startup and shared by reference.
#[derive(Clone)]
pub struct NoteService {
    notes: Arc<dyn NoteRepository>,
    shares: Arc<dyn ShareRepository>,
    users: Arc<dyn UserDirectory>,
    access: AccessControl,
    config: ServiceConfig,
}

impl NoteService {
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        shares: Arc<dyn ShareRepository>,
        users: Arc<dyn UserDirectory>,
        config: ServiceConfig,
    ) -> Self {
        let access = AccessControl::new(notes.clone(), shares.clone(), users.clone())
            .with_owner_share_policy(config.owner_share_policy);
        Self {
            notes,
            shares,
            users,
            access,
            config,
        }
    }

    /// The access control engine used by this service.
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // =========================================================================
    // NOTE CRUD
    // =========================================================================

    /// Create a note owned by `owner_id`.
    pub async fn create_note(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<NoteView> {
        let req = req.validated()?;
        let note = self.notes.insert(owner_id, req).await?;

        info!(
            subsystem = "notes",
            component = "service",
            op = "create",
            note_id = %note.id,
            user_id = %owner_id,
            "Note created"
        );
        self.view(note).await
    }

    /// Fetch a note the user may read, with owner and grant list.
    pub async fn get_note(&self, note_id: Uuid, user_id: Uuid) -> Result<NoteView> {
        let note = self.load(note_id).await?;
        self.access.authorize_read(&note, user_id).await?;
        self.view(note).await
    }

    /// Apply a partial update to a note the user may write.
    ///
    /// Returns the reloaded note in the same shape as [`Self::get_note`].
    pub async fn update_note(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        patch: NotePatch,
    ) -> Result<NoteView> {
        let note = self.load(note_id).await?;
        self.access.authorize_write(&note, user_id).await?;

        let patch = patch.validated()?;
        if patch.is_empty() {
            debug!(
                subsystem = "notes",
                component = "service",
                op = "update",
                note_id = %note_id,
                "Empty patch, nothing to write"
            );
            return self.view(note).await;
        }

        let updated = self
            .notes
            .update(note_id, &patch)
            .await?
            .ok_or_else(Error::note_not_found)?;

        debug!(
            subsystem = "notes",
            component = "service",
            op = "update",
            note_id = %note_id,
            user_id = %user_id,
            "Note updated"
        );
        self.view(updated).await
    }

    /// Delete a note and all of its grants. Owner only.
    pub async fn delete_note(&self, note_id: Uuid, user_id: Uuid) -> Result<()> {
        let note = self.load(note_id).await?;
        self.access.cascade_delete_note(&note, user_id).await
    }

    // =========================================================================
    // SHARING
    // =========================================================================

    /// Share a note with another user. Returns the refreshed note.
    pub async fn share_note(
        &self,
        note_id: Uuid,
        acting_user_id: Uuid,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<NoteView> {
        let note = self.load(note_id).await?;
        self.access
            .grant_share(&note, acting_user_id, target_user_id, permission)
            .await?;
        self.view(note).await
    }

    /// Share a note from a raw caller request.
    ///
    /// Fails with `InvalidPermission` before touching storage if the
    /// permission literal is not `read` or `write`.
    pub async fn share_note_request(
        &self,
        note_id: Uuid,
        acting_user_id: Uuid,
        req: &ShareRequest,
    ) -> Result<NoteView> {
        let permission = req.permission()?;
        self.share_note(note_id, acting_user_id, req.user_id, permission)
            .await
    }

    /// Change the permission of an existing grant. Returns the refreshed note.
    pub async fn update_sharing(
        &self,
        note_id: Uuid,
        acting_user_id: Uuid,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<NoteView> {
        let note = self.load(note_id).await?;
        self.access
            .update_share(&note, acting_user_id, target_user_id, permission)
            .await?;
        self.view(note).await
    }

    /// Remove a grant if present. Returns the refreshed note.
    pub async fn remove_sharing(
        &self,
        note_id: Uuid,
        acting_user_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<NoteView> {
        let note = self.load(note_id).await?;
        self.access
            .revoke_share(&note, acting_user_id, target_user_id)
            .await?;
        self.view(note).await
    }

    // =========================================================================
    // LIST & SEARCH
    // =========================================================================

    /// Notes owned by or shared with `user_id`, newest update first.
    pub async fn list_visible_notes(
        &self,
        user_id: Uuid,
        is_archived: bool,
        pagination: Pagination,
    ) -> Result<NotePage> {
        self.visible_page(user_id, is_archived, None, pagination, "list_visible")
            .await
    }

    /// Visible notes matching `query`. An empty query applies no text filter;
    /// any other query, whitespace included, is matched verbatim.
    pub async fn search_notes(
        &self,
        query: Option<&str>,
        user_id: Uuid,
        is_archived: bool,
        pagination: Pagination,
    ) -> Result<NotePage> {
        let search = SearchTerms::parse(query);
        self.visible_page(user_id, is_archived, search, pagination, "search")
            .await
    }

    async fn visible_page(
        &self,
        user_id: Uuid,
        is_archived: bool,
        search: Option<SearchTerms>,
        pagination: Pagination,
        op: &'static str,
    ) -> Result<NotePage> {
        let start = Instant::now();
        let window = pagination.window(self.config.page_limit, self.config.max_page_limit);
        let query = VisibilityQuery {
            user_id,
            is_archived,
            search,
            limit: window.limit,
            offset: window.offset,
        };

        let page = self.notes.list_visible(&query).await?;
        let total = page.total;
        let views = self.views(page.notes).await?;

        debug!(
            subsystem = "notes",
            component = "service",
            op,
            user_id = %user_id,
            query = query.search.as_ref().map(|s| s.text.as_str()).unwrap_or(""),
            result_count = views.len(),
            total_count = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Visible notes loaded"
        );
        Ok(NotePage::new(views, total, window))
    }

    // =========================================================================
    // VIEW ASSEMBLY
    // =========================================================================

    async fn load(&self, note_id: Uuid) -> Result<Note> {
        self.notes
            .fetch(note_id)
            .await?
            .ok_or_else(Error::note_not_found)
    }

    async fn view(&self, note: Note) -> Result<NoteView> {
        self.views(vec![note])
            .await?
            .pop()
            .ok_or_else(|| Error::Internal("view assembly returned no note".to_string()))
    }

    /// Attach owner summaries and grant lists to a batch of notes,
    /// preserving order.
    async fn views(&self, notes: Vec<Note>) -> Result<Vec<NoteView>> {
        if notes.is_empty() {
            return Ok(Vec::new());
        }

        let note_ids: Vec<Uuid> = notes.iter().map(|n| n.id).collect();
        let grants = self.shares.list_for_notes(&note_ids).await?;

        let mut user_ids: Vec<Uuid> = notes
            .iter()
            .map(|n| n.owner_id)
            .chain(grants.iter().map(|g| g.user_id))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users: HashMap<Uuid, UserSummary> = self
            .users
            .fetch_summaries(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut shared_by_note: HashMap<Uuid, Vec<SharedUser>> = HashMap::new();
        for grant in grants {
            let Some(user) = users.get(&grant.user_id) else {
                warn!(
                    subsystem = "notes",
                    component = "service",
                    note_id = %grant.note_id,
                    user_id = %grant.user_id,
                    "Grant references unknown user, skipping"
                );
                continue;
            };
            shared_by_note
                .entry(grant.note_id)
                .or_default()
                .push(SharedUser {
                    user_id: grant.user_id,
                    username: user.username.clone(),
                    email: user.email.clone(),
                    permission: grant.permission,
                });
        }

        notes
            .into_iter()
            .map(|note| {
                let owner = users.get(&note.owner_id).cloned().ok_or_else(|| {
                    Error::Internal(format!("owner {} of note {} not found", note.owner_id, note.id))
                })?;
                let shared = shared_by_note.remove(&note.id).unwrap_or_default();
                Ok(NoteView::new(note, owner, shared))
            })
            .collect()
    }
}
