//! Access control engine.
//!
//! Single source of truth for "can user U do operation O on note N", and
//! owner of the share-registry invariants:
//!
//! - the owner never holds a grant on their own note
//! - at most one grant per (note, user)
//! - only the owner creates, changes or removes grants
//! - grants never outlive their note
//!
//! Decisions are made by the pure [`resolve_permission`] function; the
//! [`AccessControl`] handle adds the grant lookup and the share mutations.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::OwnerSharePolicy;
use crate::error::{Error, Result};
use crate::models::{Note, Permission, ShareGrant};
use crate::traits::{NoteRepository, ShareRepository, UserDirectory};

/// Effective permission of a user on a note, in increasing order of access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Read,
    Write,
    /// Full read, write, share and delete rights.
    Owner,
}

impl AccessLevel {
    pub fn can_read(&self) -> bool {
        *self >= AccessLevel::Read
    }

    pub fn can_write(&self) -> bool {
        *self >= AccessLevel::Write
    }

    /// Strictly narrower than write: only the owner may delete.
    pub fn can_delete(&self) -> bool {
        *self == AccessLevel::Owner
    }

    pub fn can_share(&self) -> bool {
        *self == AccessLevel::Owner
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
            AccessLevel::Owner => "owner",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Permission> for AccessLevel {
    fn from(p: Permission) -> Self {
        match p {
            Permission::Read => AccessLevel::Read,
            Permission::Write => AccessLevel::Write,
        }
    }
}

/// Operations subject to an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Read,
    Write,
    Delete,
    Share,
    UpdateShare,
    RevokeShare,
}

impl NoteAction {
    /// Lowest access level allowed to perform the action.
    pub fn required_level(&self) -> AccessLevel {
        match self {
            NoteAction::Read => AccessLevel::Read,
            NoteAction::Write => AccessLevel::Write,
            NoteAction::Delete
            | NoteAction::Share
            | NoteAction::UpdateShare
            | NoteAction::RevokeShare => AccessLevel::Owner,
        }
    }

    /// Message surfaced to the user when the action is denied.
    pub fn denial_message(&self) -> &'static str {
        match self {
            NoteAction::Read => "Not authorized to access this note",
            NoteAction::Write => "Not authorized to edit this note",
            NoteAction::Delete => "Only the owner can delete this note",
            NoteAction::Share => "Only the owner can share this note",
            NoteAction::UpdateShare => "Only the owner can update sharing for this note",
            NoteAction::RevokeShare => "Only the owner can remove sharing for this note",
        }
    }

    fn is_owner_only(&self) -> bool {
        self.required_level() == AccessLevel::Owner
    }
}

/// Resolve the effective permission of `user_id` on `note`.
///
/// `grant` is the registry entry for (note, user), if any. A grant for a
/// different pair is ignored. Pure; no side effects.
pub fn resolve_permission(note: &Note, user_id: Uuid, grant: Option<&ShareGrant>) -> AccessLevel {
    if note.owner_id == user_id {
        return AccessLevel::Owner;
    }
    match grant {
        Some(g) if g.note_id == note.id && g.user_id == user_id => g.permission.into(),
        _ => AccessLevel::None,
    }
}

/// Check a resolved level against an action.
pub fn authorize(level: AccessLevel, action: NoteAction) -> Result<()> {
    if level >= action.required_level() {
        Ok(())
    } else {
        Err(Error::NotAuthorized(action.denial_message().to_string()))
    }
}

/// Handle to the access control engine.
///
/// Cheap to clone; holds shared handles to the stores.
#[derive(Clone)]
pub struct AccessControl {
    notes: Arc<dyn NoteRepository>,
    shares: Arc<dyn ShareRepository>,
    users: Arc<dyn UserDirectory>,
    owner_share_policy: OwnerSharePolicy,
}

impl AccessControl {
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        shares: Arc<dyn ShareRepository>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            notes,
            shares,
            users,
            owner_share_policy: OwnerSharePolicy::default(),
        }
    }

    /// Set how a grant targeting the owner is handled.
    pub fn with_owner_share_policy(mut self, policy: OwnerSharePolicy) -> Self {
        self.owner_share_policy = policy;
        self
    }

    /// Resolve the effective permission, looking up the grant when the user
    /// is not the owner.
    pub async fn resolve(&self, note: &Note, user_id: Uuid) -> Result<AccessLevel> {
        if note.is_owned_by(user_id) {
            return Ok(AccessLevel::Owner);
        }
        let grant = self.shares.find(note.id, user_id).await?;
        Ok(resolve_permission(note, user_id, grant.as_ref()))
    }

    /// Decide whether `user_id` may perform `action` on `note`.
    ///
    /// Owner-only actions are decided without touching the share registry.
    pub async fn check(&self, note: &Note, user_id: Uuid, action: NoteAction) -> Result<AccessLevel> {
        let level = if action.is_owner_only() {
            resolve_permission(note, user_id, None)
        } else {
            self.resolve(note, user_id).await?
        };

        debug!(
            subsystem = "access",
            component = "engine",
            op = "check",
            note_id = %note.id,
            user_id = %user_id,
            action = ?action,
            access_level = %level,
            "Access decision"
        );

        authorize(level, action)?;
        Ok(level)
    }

    pub async fn authorize_read(&self, note: &Note, user_id: Uuid) -> Result<AccessLevel> {
        self.check(note, user_id, NoteAction::Read).await
    }

    pub async fn authorize_write(&self, note: &Note, user_id: Uuid) -> Result<AccessLevel> {
        self.check(note, user_id, NoteAction::Write).await
    }

    pub async fn authorize_delete(&self, note: &Note, user_id: Uuid) -> Result<AccessLevel> {
        self.check(note, user_id, NoteAction::Delete).await
    }

    /// Create a grant for `target_user_id`.
    ///
    /// Returns `None` when the target is the owner and the policy is
    /// [`OwnerSharePolicy::Ignore`]; nothing is written in that case.
    pub async fn grant_share(
        &self,
        note: &Note,
        acting_user_id: Uuid,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<Option<ShareGrant>> {
        self.check(note, acting_user_id, NoteAction::Share).await?;

        if note.is_owned_by(target_user_id) {
            return match self.owner_share_policy {
                OwnerSharePolicy::Reject => Err(Error::AlreadyShared(
                    "The owner already has full access to this note".to_string(),
                )),
                OwnerSharePolicy::Ignore => {
                    debug!(
                        subsystem = "access",
                        component = "engine",
                        op = "grant_share",
                        note_id = %note.id,
                        "Ignoring share with the note owner"
                    );
                    Ok(None)
                }
            };
        }

        if !self.users.exists(target_user_id).await? {
            return Err(Error::NotFound("User not found".to_string()));
        }

        let grant = self
            .shares
            .insert(note.id, target_user_id, permission)
            .await?;

        info!(
            subsystem = "access",
            component = "engine",
            op = "grant_share",
            note_id = %note.id,
            target_user_id = %target_user_id,
            permission = %permission,
            "Note shared"
        );
        Ok(Some(grant))
    }

    /// Change the permission of an existing grant.
    pub async fn update_share(
        &self,
        note: &Note,
        acting_user_id: Uuid,
        target_user_id: Uuid,
        permission: Permission,
    ) -> Result<ShareGrant> {
        self.check(note, acting_user_id, NoteAction::UpdateShare)
            .await?;

        let grant = self
            .shares
            .update_permission(note.id, target_user_id, permission)
            .await?
            .ok_or_else(|| Error::NotShared("User is not shared with this note".to_string()))?;

        info!(
            subsystem = "access",
            component = "engine",
            op = "update_share",
            note_id = %note.id,
            target_user_id = %target_user_id,
            permission = %permission,
            "Share permission updated"
        );
        Ok(grant)
    }

    /// Remove the grant for `target_user_id`. Idempotent.
    ///
    /// Returns whether a grant was actually removed.
    pub async fn revoke_share(
        &self,
        note: &Note,
        acting_user_id: Uuid,
        target_user_id: Uuid,
    ) -> Result<bool> {
        self.check(note, acting_user_id, NoteAction::RevokeShare)
            .await?;

        let removed = self.shares.delete(note.id, target_user_id).await?;

        info!(
            subsystem = "access",
            component = "engine",
            op = "revoke_share",
            note_id = %note.id,
            target_user_id = %target_user_id,
            removed,
            "Share revoked"
        );
        Ok(removed)
    }

    /// Delete the note together with all of its grants.
    pub async fn cascade_delete_note(&self, note: &Note, acting_user_id: Uuid) -> Result<()> {
        self.authorize_delete(note, acting_user_id).await?;

        if !self.notes.delete_cascade(note.id).await? {
            return Err(Error::note_not_found());
        }

        info!(
            subsystem = "access",
            component = "engine",
            op = "cascade_delete",
            note_id = %note.id,
            "Note deleted"
        );
        Ok(())
    }
}
