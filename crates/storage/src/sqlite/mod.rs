use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    ActivityCatalog, GroupDirectory, SessionActivityRepository, SessionRepository, Storage,
    TransactionalPurge,
};

mod catalog_repo;
mod mapping;
mod migrate;
mod purge;
mod session_activity_repo;
mod session_repo;

/// Pool settings for the `SQLite` backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl SqliteConfig {
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL and default pool settings.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(&SqliteConfig::new(database_url)).await
    }

    /// Connect with explicit pool settings.
    ///
    /// Every pooled connection enforces foreign keys; the session purge
    /// ordering depends on it.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect_with(config: &SqliteConfig) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await?;
        tracing::debug!(
            url = %config.database_url,
            max_connections = config.max_connections,
            "sqlite pool ready"
        );
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }

    /// Bundle this repository as a `Storage`, including transactional purge.
    #[must_use]
    pub fn into_storage(self) -> Storage {
        let sessions: Arc<dyn SessionRepository> = Arc::new(self.clone());
        let session_activities: Arc<dyn SessionActivityRepository> = Arc::new(self.clone());
        let catalog: Arc<dyn ActivityCatalog> = Arc::new(self.clone());
        let groups: Arc<dyn GroupDirectory> = Arc::new(self.clone());
        let purge: Arc<dyn TransactionalPurge> = Arc::new(self);
        Storage {
            sessions,
            session_activities,
            catalog,
            groups,
            purge: Some(purge),
        }
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(config: &SqliteConfig) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect_with(config).await?;
        repo.migrate().await?;
        Ok(repo.into_storage())
    }
}
