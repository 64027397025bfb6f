use async_trait::async_trait;
use portal_core::model::{
    ActivityId, Group, GroupId, NewGroup, NewSession, NewSessionActivity, NewStudyActivity,
    Session, SessionActivity, SessionActivityId, SessionId, StudyActivity,
};
use std::sync::Arc;
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub(crate) fn validation<E: std::fmt::Display>(e: E) -> Self {
        Self::Validation(e.to_string())
    }
}

//
// ─── SESSIONS ─────────────────────────────────────────────────────────────────
//

/// Persistence contract for sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new open session and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Validation` if `activity_id` is zero or
    /// `start_time` is unset.
    async fn create_session(&self, session: &NewSession) -> Result<Session, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError>;

    /// Persist `end_time` and `score`, but only while the stored row is still
    /// open. The check and the write are one statement.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist, or
    /// `StorageError::Conflict` if it is already closed.
    async fn close_session(&self, session: &Session) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or
    /// `StorageError::ConstraintViolation` while activities still reference it.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;

    /// Newest first (`created_at` descending, then id descending).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_sessions(&self, limit: u32, offset: u64) -> Result<Vec<Session>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_sessions(&self) -> Result<u64, StorageError>;

    /// Delete every session and return how many rows were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::ConstraintViolation` if activities still exist.
    async fn delete_all_sessions(&self) -> Result<u64, StorageError>;
}

//
// ─── SESSION ACTIVITIES ───────────────────────────────────────────────────────
//

/// Persistence contract for answers recorded inside sessions.
#[async_trait]
pub trait SessionActivityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Validation` for zero ids or blank challenge/answer,
    /// `StorageError::ConstraintViolation` if the session does not exist,
    /// `StorageError::Conflict` if it is closed.
    async fn create_session_activity(
        &self,
        activity: &NewSessionActivity,
    ) -> Result<SessionActivity, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session_activity(
        &self,
        id: SessionActivityId,
    ) -> Result<SessionActivity, StorageError>;

    /// Oldest first (`created_at` ascending, then id ascending).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_session_activities(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionActivity>, StorageError>;

    /// Persist `input`, `result` and `score` while the owning session is open.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the activity does not exist, or
    /// `StorageError::Conflict` if its session is closed.
    async fn update_session_activity(&self, activity: &SessionActivity)
    -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete_session_activity(&self, id: SessionActivityId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_session_activities(&self, session_id: SessionId)
    -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_all_session_activities(&self) -> Result<u64, StorageError>;
}

//
// ─── CATALOG + GROUPS ─────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ActivityCatalog: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails. A missing id is `Ok(None)`.
    async fn get_activity(&self, id: ActivityId) -> Result<Option<StudyActivity>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_activities(&self) -> Result<Vec<StudyActivity>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is already taken.
    async fn insert_activity(&self, activity: &NewStudyActivity)
    -> Result<ActivityId, StorageError>;
}

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails. A missing id is `Ok(None)`.
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_groups(&self) -> Result<Vec<Group>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is already taken.
    async fn insert_group(&self, group: &NewGroup) -> Result<GroupId, StorageError>;
}

//
// ─── TRANSACTIONAL PURGE ──────────────────────────────────────────────────────
//

/// One open transaction covering the bulk delete of sessions and activities.
///
/// The caller chooses the order of the two deletes. Dropping a unit without
/// calling `commit` rolls everything back.
#[async_trait]
pub trait PurgeUnit: Send {
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_all_session_activities(&mut self) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::ConstraintViolation` if activities still exist.
    async fn delete_all_sessions(&mut self) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the commit fails or the unit was already finished.
    async fn commit(&mut self) -> Result<(), StorageError>;
}

/// Implemented by backends that can run several statements atomically.
#[async_trait]
pub trait TransactionalPurge: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if a transaction cannot be started.
    async fn begin_purge(&self) -> Result<Box<dyn PurgeUnit>, StorageError>;
}

//
// ─── STORAGE BUNDLE ───────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub session_activities: Arc<dyn SessionActivityRepository>,
    pub catalog: Arc<dyn ActivityCatalog>,
    pub groups: Arc<dyn GroupDirectory>,
    /// `None` when the backend has no transactions.
    pub purge: Option<Arc<dyn TransactionalPurge>>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    /// Share an existing in-memory repository, e.g. one a test already seeded.
    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        Self {
            sessions: Arc::new(repo.clone()),
            session_activities: Arc::new(repo.clone()),
            catalog: Arc::new(repo.clone()),
            groups: Arc::new(repo.clone()),
            purge: None,
        }
    }
}
