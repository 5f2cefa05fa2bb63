//! # quire-db
//!
//! PostgreSQL storage layer for quire.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for notes, share grants and users
//! - Schema migrations (`migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use quire_db::{Database, DatabaseConfig};
//! use quire_core::{CreateNoteRequest, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect_with_config(&DatabaseConfig::from_env()?).await?;
//!     db.migrate().await?;
//!
//!     let alice = db.users.insert("alice", "alice@example.com").await?;
//!     let service = db.service(ServiceConfig::from_env()?);
//!     let note = service
//!         .create_note(alice.id, CreateNoteRequest {
//!             title: "Hello".to_string(),
//!             content: "world".to_string(),
//!             tags: vec![],
//!         })
//!         .await?;
//!
//!     println!("Created note: {}", note.id);
//!     db.close().await;
//!     Ok(())
//! }
//! ```

pub mod notes;
pub mod pool;
pub mod shares;
pub mod users;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

use tracing::info;

// Re-export core types
pub use quire_core::*;

pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, DatabaseConfig, PoolConfig};
pub use shares::PgShareRepository;
pub use users::PgUserRepository;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
///
/// Constructed once at startup; hand [`Database::service`] to request
/// handlers and call [`Database::close`] on shutdown.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub notes: Arc<PgNoteRepository>,
    pub shares: Arc<PgShareRepository>,
    pub users: Arc<PgUserRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: Arc::new(PgNoteRepository::new(pool.clone())),
            shares: Arc::new(PgShareRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect using a URL and pool settings.
    pub async fn connect_with_config(config: &DatabaseConfig) -> Result<Self> {
        let pool = create_pool_with_config(&config.url, config.pool.clone()).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "database",
            component = "migrations",
            op = "migrate",
            "Migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Build a [`NoteService`] over this database's repositories.
    pub fn service(&self, config: ServiceConfig) -> NoteService {
        NoteService::new(
            self.notes.clone(),
            self.shares.clone(),
            self.users.clone(),
            config,
        )
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        info!(
            subsystem = "database",
            component = "pool",
            op = "close",
            "Database connection pool closed"
        );
    }
}
