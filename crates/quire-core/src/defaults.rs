//! Centralized default constants for quire.
//!
//! Every crate references these constants instead of defining its own magic
//! numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for note list and search.
pub const PAGE_LIMIT: i64 = 20;

/// Upper bound for a caller-supplied page size.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// First page number (pages are 1-based).
pub const FIRST_PAGE: i64 = 1;

// =============================================================================
// NOTE FIELDS
// =============================================================================

/// Maximum title length in characters (matches the `VARCHAR(255)` column).
pub const TITLE_MAX_LEN: usize = 255;

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL when DATABASE_URL is not set.
pub const DATABASE_URL: &str = "postgres://localhost/quire";
