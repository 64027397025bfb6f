//! Shared error types for the services crate.

use std::fmt;

use thiserror::Error;

use portal_core::model::{SessionActivityError, SessionError, SessionId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Kinds of records a lookup can miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Session,
    SessionActivity,
    Activity,
    Group,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::Session => "session",
            Entity::SessionActivity => "session activity",
            Entity::Activity => "activity",
            Entity::Group => "group",
        })
    }
}

/// Errors emitted by `SessionLifecycleService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    /// Malformed input: blank text, out-of-range score, zero id.
    #[error(transparent)]
    Validation(#[from] portal_core::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },

    /// A foreign id that does not resolve at creation time.
    #[error("{entity} {id} does not exist")]
    InvalidReference { entity: Entity, id: u64 },

    #[error("cannot {action}: session {session_id} is already closed")]
    Conflict {
        session_id: SessionId,
        action: &'static str,
    },

    #[error("{operation} violated referential integrity: {source}")]
    ConstraintViolation {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("{operation} failed: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    /// Activities were removed but the session phase failed; sessions remain.
    #[error(
        "session purge incomplete: {activities_deleted} activities deleted, sessions not deleted: {source}"
    )]
    PartialPurge {
        activities_deleted: u64,
        #[source]
        source: StorageError,
    },
}

impl From<SessionError> for SessionServiceError {
    fn from(e: SessionError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<SessionActivityError> for SessionServiceError {
    fn from(e: SessionActivityError) -> Self {
        Self::Validation(e.into())
    }
}

impl SessionServiceError {
    /// Wrap a store failure with the operation that hit it.
    pub(crate) fn storage(operation: &'static str, source: StorageError) -> Self {
        match source {
            StorageError::ConstraintViolation(_) => {
                tracing::warn!(operation, error = %source, "constraint violation");
                Self::ConstraintViolation { operation, source }
            }
            _ => {
                tracing::error!(operation, error = %source, "store failure");
                Self::Persistence { operation, source }
            }
        }
    }

    /// Like [`Self::storage`], but a missing row becomes `NotFound`.
    pub(crate) fn lookup(
        entity: Entity,
        id: u64,
        operation: &'static str,
    ) -> impl FnOnce(StorageError) -> Self {
        move |source| match source {
            StorageError::NotFound => Self::NotFound { entity, id },
            other => Self::storage(operation, other),
        }
    }

    /// Like [`Self::lookup`], for writes the store refuses once `session_id` is closed.
    pub(crate) fn guarded(
        entity: Entity,
        id: u64,
        session_id: SessionId,
        action: &'static str,
    ) -> impl FnOnce(StorageError) -> Self {
        move |source| match source {
            StorageError::Conflict(_) => {
                tracing::info!(%session_id, action, "session closed before write");
                Self::Conflict { session_id, action }
            }
            other => Self::lookup(entity, id, action)(other),
        }
    }

    /// True when the caller can fix the request; false for store faults.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::InvalidReference { .. }
                | Self::Conflict { .. }
        )
    }

    /// Text safe to show an end user. Store details stay in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            "operation failed".to_owned()
        }
    }
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error("activity {0} not found")]
    ActivityNotFound(u64),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
