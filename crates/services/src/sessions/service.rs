use std::sync::Arc;

use portal_core::model::{
    ActivityId, ActivityResult, ActivityScore, GroupId, NewSession, NewSessionActivity, Page,
    PageRequest, Session, SessionActivity, SessionActivityId, SessionError, SessionId,
    SessionResults,
};
use storage::repository::{
    ActivityCatalog, GroupDirectory, SessionActivityRepository, SessionRepository, Storage,
    TransactionalPurge,
};

use crate::Clock;
use crate::error::{Entity, SessionServiceError};

/// Owns the session state machine: open, record answers, evaluate, close, delete.
///
/// Timestamps come from the injected `Clock`. Every operation is a single
/// future; dropping it before completion abandons the work, and nothing is
/// retried.
#[derive(Clone)]
pub struct SessionLifecycleService {
    pub(super) clock: Clock,
    pub(super) sessions: Arc<dyn SessionRepository>,
    pub(super) activities: Arc<dyn SessionActivityRepository>,
    catalog: Arc<dyn ActivityCatalog>,
    groups: Arc<dyn GroupDirectory>,
    pub(super) purge: Option<Arc<dyn TransactionalPurge>>,
}

impl SessionLifecycleService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        activities: Arc<dyn SessionActivityRepository>,
        catalog: Arc<dyn ActivityCatalog>,
        groups: Arc<dyn GroupDirectory>,
    ) -> Self {
        Self {
            clock,
            sessions,
            activities,
            catalog,
            groups,
            purge: None,
        }
    }

    /// Run bulk deletes inside one backend transaction.
    #[must_use]
    pub fn with_transactional_purge(mut self, purge: Arc<dyn TransactionalPurge>) -> Self {
        self.purge = Some(purge);
        self
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        let service = Self::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.session_activities),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.groups),
        );
        match &storage.purge {
            Some(purge) => service.with_transactional_purge(Arc::clone(purge)),
            None => service,
        }
    }

    //
    // ─── SESSIONS ──────────────────────────────────────────────────────────────
    //

    /// Open a session for a catalog activity, optionally scoped to a group.
    ///
    /// # Errors
    ///
    /// `Validation` for zero ids, `InvalidReference` when the activity or
    /// group does not exist, `Persistence` for store failures.
    #[tracing::instrument(skip(self), fields(activity_id = %activity_id))]
    pub async fn create_session(
        &self,
        activity_id: ActivityId,
        group_id: Option<GroupId>,
    ) -> Result<Session, SessionServiceError> {
        let draft = NewSession::open(activity_id, group_id, self.clock.now())?;

        self.require_activity(activity_id).await?;
        if let Some(group_id) = group_id {
            let group = self
                .groups
                .get_group(group_id)
                .await
                .map_err(|e| SessionServiceError::storage("look up group", e))?;
            if group.is_none() {
                return Err(SessionServiceError::InvalidReference {
                    entity: Entity::Group,
                    id: group_id.value(),
                });
            }
        }

        let session = self
            .sessions
            .create_session(&draft)
            .await
            .map_err(|e| SessionServiceError::storage("create session", e))?;
        tracing::info!(session_id = %session.id(), "session opened");
        Ok(session)
    }

    /// # Errors
    ///
    /// `NotFound` if no session has this id.
    pub async fn get_session(&self, id: SessionId) -> Result<Session, SessionServiceError> {
        self.sessions
            .get_session(id)
            .await
            .map_err(SessionServiceError::lookup(Entity::Session, id.value(), "load session"))
    }

    /// A session together with its activities and aggregate scoring.
    ///
    /// # Errors
    ///
    /// `NotFound` if no session has this id.
    pub async fn session_results(
        &self,
        id: SessionId,
    ) -> Result<SessionResults, SessionServiceError> {
        let session = self.get_session(id).await?;
        let activities = self
            .activities
            .list_session_activities(id)
            .await
            .map_err(|e| SessionServiceError::storage("list session activities", e))?;
        Ok(SessionResults::from_activities(session, activities))
    }

    /// Close an open session with the caller's final score.
    ///
    /// # Errors
    ///
    /// `NotFound` if missing, `Validation` for a negative or oversized score,
    /// `Conflict` if the session is already closed.
    #[tracing::instrument(skip(self), fields(session_id = %id))]
    pub async fn end_session(
        &self,
        id: SessionId,
        score: i64,
    ) -> Result<Session, SessionServiceError> {
        let mut session = self.get_session(id).await?;
        session.close(self.clock.now(), score).map_err(|e| match e {
            SessionError::AlreadyClosed => SessionServiceError::Conflict {
                session_id: id,
                action: "end session",
            },
            other => other.into(),
        })?;

        self.sessions
            .close_session(&session)
            .await
            .map_err(SessionServiceError::guarded(
                Entity::Session,
                id.value(),
                id,
                "end session",
            ))?;
        tracing::info!(score = session.score(), "session closed");
        Ok(session)
    }

    /// One page of sessions, newest first.
    ///
    /// `page < 1` is treated as 1; a `page_size` outside `1..=100` falls back
    /// to the default size.
    ///
    /// # Errors
    ///
    /// `Persistence` for store failures.
    pub async fn list_sessions(
        &self,
        page: i64,
        page_size: i64,
    ) -> Result<Page<Session>, SessionServiceError> {
        let request = PageRequest::new(page, page_size);
        let items = self
            .sessions
            .list_sessions(request.limit(), request.offset())
            .await
            .map_err(|e| SessionServiceError::storage("list sessions", e))?;
        let total = self
            .sessions
            .count_sessions()
            .await
            .map_err(|e| SessionServiceError::storage("count sessions", e))?;
        Ok(Page::new(items, total, &request))
    }

    /// Delete one session and its activities. Returns how many activities went with it.
    ///
    /// # Errors
    ///
    /// `NotFound` if missing, `Persistence` for store failures.
    #[tracing::instrument(skip(self), fields(session_id = %id))]
    pub async fn delete_session(&self, id: SessionId) -> Result<u64, SessionServiceError> {
        self.get_session(id).await?;
        let removed = self
            .activities
            .delete_session_activities(id)
            .await
            .map_err(|e| SessionServiceError::storage("delete session activities", e))?;
        self.sessions
            .delete_session(id)
            .await
            .map_err(SessionServiceError::lookup(Entity::Session, id.value(), "delete session"))?;
        tracing::info!(activities_deleted = removed, "session deleted");
        Ok(removed)
    }

    //
    // ─── SESSION ACTIVITIES ────────────────────────────────────────────────────
    //

    /// Record one answered prompt inside an open session. Starts unevaluated.
    ///
    /// # Errors
    ///
    /// `Validation` for zero ids or blank challenge/answer, `NotFound` if the
    /// session is missing, `Conflict` if it is closed, `InvalidReference` for
    /// an unknown catalog activity.
    #[tracing::instrument(skip(self, challenge, answer, input), fields(session_id = %session_id))]
    pub async fn add_session_activity(
        &self,
        session_id: SessionId,
        activity_id: ActivityId,
        challenge: &str,
        answer: &str,
        input: &str,
    ) -> Result<SessionActivity, SessionServiceError> {
        let draft = NewSessionActivity::new(
            session_id,
            activity_id,
            challenge,
            answer,
            input,
            self.clock.now(),
        )?;

        let session = self.get_session(session_id).await?;
        if !session.is_open() {
            return Err(SessionServiceError::Conflict {
                session_id,
                action: "add activity",
            });
        }
        self.require_activity(activity_id).await?;

        let activity = self
            .activities
            .create_session_activity(&draft)
            .await
            .map_err(SessionServiceError::guarded(
                Entity::Session,
                session_id.value(),
                session_id,
                "add activity",
            ))?;
        tracing::debug!(session_activity_id = %activity.id(), "activity recorded");
        Ok(activity)
    }

    /// Mark an activity as a success or failure with a score in `0..=100`.
    ///
    /// Re-evaluating overwrites the previous verdict.
    ///
    /// # Errors
    ///
    /// `Validation` for an out-of-range score (nothing is changed),
    /// `NotFound` if the activity is missing, `Conflict` if its session is closed.
    #[tracing::instrument(skip(self), fields(session_activity_id = %id))]
    pub async fn evaluate_session_activity(
        &self,
        id: SessionActivityId,
        result: ActivityResult,
        score: i64,
    ) -> Result<SessionActivity, SessionServiceError> {
        let score = ActivityScore::new(score)?;

        let mut activity = self.get_session_activity(id).await?;
        let session = self.get_session(activity.session_id()).await?;
        if !session.is_open() {
            return Err(SessionServiceError::Conflict {
                session_id: session.id(),
                action: "evaluate activity",
            });
        }

        activity.evaluate(result, score);
        self.activities
            .update_session_activity(&activity)
            .await
            .map_err(SessionServiceError::guarded(
                Entity::SessionActivity,
                id.value(),
                session.id(),
                "evaluate activity",
            ))?;
        tracing::info!(result = %result, score = score.value(), "activity evaluated");
        Ok(activity)
    }

    /// # Errors
    ///
    /// `NotFound` if no activity has this id.
    pub async fn get_session_activity(
        &self,
        id: SessionActivityId,
    ) -> Result<SessionActivity, SessionServiceError> {
        self.activities
            .get_session_activity(id)
            .await
            .map_err(SessionServiceError::lookup(
                Entity::SessionActivity,
                id.value(),
                "load session activity",
            ))
    }

    /// Activities of one session, oldest first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the session is missing.
    pub async fn list_session_activities(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionActivity>, SessionServiceError> {
        self.get_session(session_id).await?;
        self.activities
            .list_session_activities(session_id)
            .await
            .map_err(|e| SessionServiceError::storage("list session activities", e))
    }

    /// # Errors
    ///
    /// `NotFound` if no activity has this id.
    #[tracing::instrument(skip(self), fields(session_activity_id = %id))]
    pub async fn delete_session_activity(
        &self,
        id: SessionActivityId,
    ) -> Result<(), SessionServiceError> {
        self.activities
            .delete_session_activity(id)
            .await
            .map_err(SessionServiceError::lookup(
                Entity::SessionActivity,
                id.value(),
                "delete session activity",
            ))
    }

    async fn require_activity(&self, id: ActivityId) -> Result<(), SessionServiceError> {
        let found = self
            .catalog
            .get_activity(id)
            .await
            .map_err(|e| SessionServiceError::storage("look up activity", e))?;
        match found {
            Some(_) => Ok(()),
            None => Err(SessionServiceError::InvalidReference {
                entity: Entity::Activity,
                id: id.value(),
            }),
        }
    }
}
