//! Core data models for quire.
//!
//! These types are shared across the quire crates and represent the note,
//! share-grant and user entities plus the read-side shapes handed back to
//! callers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A note as stored in the note store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,
    /// Owner of the note. Fixed for the note's lifetime.
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Request for creating a new note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateNoteRequest {
    /// Check field rules and return a copy with normalized tags.
    pub fn validated(self) -> Result<Self> {
        validate_title(&self.title)?;
        validate_content(&self.content)?;
        Ok(Self {
            title: self.title,
            content: self.content,
            tags: normalize_tags(self.tags),
        })
    }
}

/// Partial update of a note.
///
/// Only fields that are `Some` are written; omitted fields keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_archived: Option<bool>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.is_archived.is_none()
    }

    /// Check the present fields and normalize tags.
    pub fn validated(self) -> Result<Self> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        Ok(Self {
            tags: self.tags.map(normalize_tags),
            ..self
        })
    }

    /// Apply the present fields to `note` and bump `updated_at`.
    pub fn apply_to(&self, note: &mut Note, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
        if let Some(archived) = self.is_archived {
            note.is_archived = archived;
        }
        note.updated_at = now;
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    if title.chars().count() > defaults::TITLE_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "title must be {} characters or less",
            defaults::TITLE_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::InvalidInput("content must not be empty".to_string()));
    }
    Ok(())
}

/// Trim tags and drop blanks and duplicates, keeping first occurrence order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

// =============================================================================
// SHARE TYPES
// =============================================================================

/// Permission carried by a share grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            other => Err(Error::InvalidPermission(format!(
                "'{}' (expected 'read' or 'write')",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

/// A grant authorizing a non-owner user to read or write a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: Uuid,
    pub note_id: Uuid,
    pub user_id: Uuid,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Share mutation input as received from a caller.
///
/// The permission stays a raw string until [`ShareRequest::permission`] is
/// called so that invalid literals surface as `InvalidPermission`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRequest {
    pub user_id: Uuid,
    pub permission: String,
}

impl ShareRequest {
    pub fn permission(&self) -> Result<Permission> {
        self.permission.parse()
    }
}

// =============================================================================
// USER TYPES
// =============================================================================

/// Public summary of a user, as rendered next to notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// A grantee of a note together with their permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub permission: Permission,
}

// =============================================================================
// READ-SIDE VIEWS
// =============================================================================

/// A note enriched with its owner and full grant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: UserSummary,
    pub shared_users: Vec<SharedUser>,
}

impl NoteView {
    pub fn new(note: Note, owner: UserSummary, shared_users: Vec<SharedUser>) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            tags: note.tags,
            is_archived: note.is_archived,
            created_at: note.created_at,
            updated_at: note.updated_at,
            owner,
            shared_users,
        }
    }

    /// Permission held by `user_id` through a grant, if any.
    pub fn permission_of(&self, user_id: Uuid) -> Option<Permission> {
        self.shared_users
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.permission)
    }
}

/// Page-number based pagination as supplied by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Resolve to a concrete window, applying defaults and clamping.
    pub fn window(&self, default_limit: i64, max_limit: i64) -> PageWindow {
        let max_limit = max_limit.max(1);
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .clamp(1, max_limit);
        let page = self
            .page
            .filter(|p| *p >= defaults::FIRST_PAGE)
            .unwrap_or(defaults::FIRST_PAGE);
        PageWindow {
            limit,
            offset: (page - defaults::FIRST_PAGE).saturating_mul(limit),
        }
    }
}

/// Concrete limit/offset pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// One page of notes visible to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePage {
    pub notes: Vec<NoteView>,
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

impl NotePage {
    pub fn new(notes: Vec<NoteView>, total_items: i64, window: PageWindow) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + window.limit - 1) / window.limit
        };
        Self {
            notes,
            total_items,
            total_pages,
            current_page: window.offset / window.limit + defaults::FIRST_PAGE,
        }
    }
}
