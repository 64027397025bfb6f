#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod error;
pub mod sessions;

pub use portal_core::Clock;

pub use app_services::PortalServices;
pub use catalog_service::{CatalogService, SeedReport};
pub use error::{AppServicesError, CatalogServiceError, Entity, SessionServiceError};
pub use sessions::{PurgeOutcome, SessionLifecycleService};
