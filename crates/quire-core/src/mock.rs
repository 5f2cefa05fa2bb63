//! In-memory store for deterministic testing.
//!
//! [`MemoryStore`] implements [`NoteRepository`], [`ShareRepository`] and
//! [`UserDirectory`] over a single mutex-guarded state, so every operation is
//! atomic with respect to the others, including the uniqueness check on
//! grant insert and the cascade on note delete.
//!
//! ## Usage
//!
//! ```rust
//! use quire_core::mock::MemoryStore;
//! use quire_core::ServiceConfig;
//!
//! let store = MemoryStore::new();
//! let alice = store.add_user("alice", "alice@example.com");
//! let service = store.service(ServiceConfig::default());
//! # let _ = (alice, service);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::models::*;
use crate::service::NoteService;
use crate::traits::*;
use crate::uuid_utils::new_v7;

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, UserSummary>,
    notes: HashMap<Uuid, Note>,
    /// Keyed by (note_id, user_id), which is what makes grants unique.
    grants: HashMap<(Uuid, Uuid), ShareGrant>,
}

/// Mock store shared by all three repository roles.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    /// Register a user and return its id.
    pub fn add_user(&self, username: &str, email: &str) -> Uuid {
        let id = new_v7();
        if let Ok(mut state) = self.lock() {
            state.users.insert(
                id,
                UserSummary {
                    id,
                    username: username.to_string(),
                    email: email.to_string(),
                },
            );
        }
        id
    }

    /// Number of grants currently referencing `note_id`.
    pub fn grant_count(&self, note_id: Uuid) -> usize {
        self.lock()
            .map(|s| s.grants.keys().filter(|(n, _)| *n == note_id).count())
            .unwrap_or(0)
    }

    /// Snapshot of a stored note, bypassing access checks.
    pub fn fetch_note(&self, note_id: Uuid) -> Option<Note> {
        self.lock().ok()?.notes.get(&note_id).cloned()
    }

    /// Snapshot of a stored grant, bypassing access checks.
    pub fn fetch_grant(&self, note_id: Uuid, user_id: Uuid) -> Option<ShareGrant> {
        self.lock().ok()?.grants.get(&(note_id, user_id)).cloned()
    }

    /// Build a [`NoteService`] backed by this store.
    pub fn service(&self, config: ServiceConfig) -> NoteService {
        let store = Arc::new(self.clone());
        NoteService::new(store.clone(), store.clone(), store, config)
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Note> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&owner_id) {
            return Err(Error::NotFound("User not found".to_string()));
        }
        let now = Utc::now();
        let note = Note {
            id: new_v7(),
            owner_id,
            title: req.title,
            content: req.content,
            tags: req.tags,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };
        state.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Note>> {
        Ok(self.lock()?.notes.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, patch: &NotePatch) -> Result<Option<Note>> {
        let mut state = self.lock()?;
        let Some(note) = state.notes.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply_to(note, Utc::now());
        Ok(Some(note.clone()))
    }

    async fn list_visible(&self, query: &VisibilityQuery) -> Result<VisibleNotes> {
        let state = self.lock()?;
        let mut visible: Vec<&Note> = state
            .notes
            .values()
            .filter(|n| n.is_archived == query.is_archived)
            .filter(|n| {
                n.owner_id == query.user_id || state.grants.contains_key(&(n.id, query.user_id))
            })
            .filter(|n| query.search.as_ref().map_or(true, |s| s.matches(n)))
            .collect();

        visible.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = visible.len() as i64;
        let notes = visible
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(VisibleNotes { notes, total })
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<bool> {
        let mut state = self.lock()?;
        state.grants.retain(|(note_id, _), _| *note_id != id);
        Ok(state.notes.remove(&id).is_some())
    }
}

#[async_trait]
impl ShareRepository for MemoryStore {
    async fn find(&self, note_id: Uuid, user_id: Uuid) -> Result<Option<ShareGrant>> {
        Ok(self.lock()?.grants.get(&(note_id, user_id)).cloned())
    }

    async fn insert(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<ShareGrant> {
        let mut state = self.lock()?;
        if !state.notes.contains_key(&note_id) {
            return Err(Error::NotFound("Note not found".to_string()));
        }
        if !state.users.contains_key(&user_id) {
            return Err(Error::NotFound("User not found".to_string()));
        }
        if state.grants.contains_key(&(note_id, user_id)) {
            return Err(Error::AlreadyShared(
                "Note is already shared with this user".to_string(),
            ));
        }
        let now = Utc::now();
        let grant = ShareGrant {
            id: new_v7(),
            note_id,
            user_id,
            permission,
            created_at: now,
            updated_at: now,
        };
        state.grants.insert((note_id, user_id), grant.clone());
        Ok(grant)
    }

    async fn update_permission(
        &self,
        note_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<Option<ShareGrant>> {
        let mut state = self.lock()?;
        let Some(grant) = state.grants.get_mut(&(note_id, user_id)) else {
            return Ok(None);
        };
        grant.permission = permission;
        grant.updated_at = Utc::now();
        Ok(Some(grant.clone()))
    }

    async fn delete(&self, note_id: Uuid, user_id: Uuid) -> Result<bool> {
        Ok(self.lock()?.grants.remove(&(note_id, user_id)).is_some())
    }

    async fn list_for_notes(&self, note_ids: &[Uuid]) -> Result<Vec<ShareGrant>> {
        let state = self.lock()?;
        let mut grants: Vec<ShareGrant> = state
            .grants
            .values()
            .filter(|g| note_ids.contains(&g.note_id))
            .cloned()
            .collect();
        grants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(grants)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn fetch_summaries(&self, user_ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let state = self.lock()?;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn exists(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.lock()?.users.contains_key(&user_id))
    }
}
