use std::sync::Arc;

use storage::repository::Storage;
use storage::sqlite::SqliteConfig;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::sessions::SessionLifecycleService;

/// Assembles the services a front end needs from one storage bundle.
#[derive(Clone)]
pub struct PortalServices {
    sessions: Arc<SessionLifecycleService>,
    catalog: Arc<CatalogService>,
}

impl PortalServices {
    /// Build services backed by a migrated `SQLite` database.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(config: &SqliteConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(config).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over an already-constructed storage bundle.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        Self {
            sessions: Arc::new(SessionLifecycleService::from_storage(clock, storage)),
            catalog: Arc::new(CatalogService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.groups),
            )),
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<SessionLifecycleService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }
}
