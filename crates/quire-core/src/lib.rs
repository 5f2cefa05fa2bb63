//! # quire-core
//!
//! Core types, traits, and the access control engine for quire.
//!
//! This crate decides who may read, edit, share and delete a note, and
//! orchestrates note operations on top of storage traits that `quire-db`
//! implements on PostgreSQL.

pub mod access;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod search;
pub mod service;
pub mod traits;
pub mod uuid_utils;

// In-memory store for tests.
// Note: Always compiled so integration tests (in tests/) and downstream crates can use it.
pub mod mock;

// Re-export commonly used types at crate root
pub use access::{authorize, resolve_permission, AccessControl, AccessLevel, NoteAction};
pub use config::{OwnerSharePolicy, ServiceConfig};
pub use error::{Error, ErrorKind, Result};
pub use models::*;
pub use search::SearchTerms;
pub use service::NoteService;
pub use traits::*;
pub use uuid_utils::new_v7;
