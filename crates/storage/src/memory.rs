use async_trait::async_trait;
use portal_core::model::{
    ActivityId, Group, GroupId, NewGroup, NewSession, NewSessionActivity, NewStudyActivity,
    Session, SessionActivity, SessionActivityId, SessionId, StudyActivity,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::repository::{
    ActivityCatalog, GroupDirectory, SessionActivityRepository, SessionRepository, StorageError,
};

#[derive(Default)]
struct State {
    last_session_id: u64,
    last_activity_row_id: u64,
    last_catalog_id: u64,
    last_group_id: u64,
    sessions: BTreeMap<SessionId, Session>,
    activities: BTreeMap<SessionActivityId, SessionActivity>,
    catalog: BTreeMap<ActivityId, StudyActivity>,
    groups: BTreeMap<GroupId, Group>,
}

impl State {
    fn session_has_activities(&self, id: SessionId) -> bool {
        self.activities.values().any(|a| a.session_id() == id)
    }
}

/// In-memory repository for tests and prototyping.
///
/// Enforces the same references a foreign-key store would: sessions must
/// point at catalog entries (and groups, when set), activities at sessions,
/// and a session cannot be deleted while activities still reference it.
/// It has no transactions.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session, StorageError> {
        session.validate().map_err(StorageError::validation)?;
        let mut guard = self.lock()?;
        if !guard.catalog.contains_key(&session.activity_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "unknown activity {}",
                session.activity_id
            )));
        }
        if let Some(group_id) = session.group_id {
            if !guard.groups.contains_key(&group_id) {
                return Err(StorageError::ConstraintViolation(format!(
                    "unknown group {group_id}"
                )));
            }
        }

        guard.last_session_id += 1;
        let created = Session::from_new(SessionId::new(guard.last_session_id), session);
        guard.sessions.insert(created.id(), created.clone());
        Ok(created)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let guard = self.lock()?;
        guard.sessions.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn close_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard
            .sessions
            .get_mut(&session.id())
            .ok_or(StorageError::NotFound)?;
        if !slot.is_open() {
            return Err(StorageError::Conflict(format!(
                "session {} is closed",
                session.id()
            )));
        }
        *slot = session.clone();
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.sessions.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        if guard.session_has_activities(id) {
            return Err(StorageError::ConstraintViolation(format!(
                "session {id} still has activities"
            )));
        }
        guard.sessions.remove(&id);
        Ok(())
    }

    async fn list_sessions(&self, limit: u32, offset: u64) -> Result<Vec<Session>, StorageError> {
        let guard = self.lock()?;
        let mut sessions: Vec<Session> = guard.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(sessions.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_sessions(&self) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard.sessions.len() as u64)
    }

    async fn delete_all_sessions(&self) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        if !guard.activities.is_empty() {
            return Err(StorageError::ConstraintViolation(
                "session activities still reference sessions".into(),
            ));
        }
        let removed = guard.sessions.len() as u64;
        guard.sessions.clear();
        Ok(removed)
    }
}

#[async_trait]
impl SessionActivityRepository for InMemoryRepository {
    async fn create_session_activity(
        &self,
        activity: &NewSessionActivity,
    ) -> Result<SessionActivity, StorageError> {
        activity.validate().map_err(StorageError::validation)?;
        let mut guard = self.lock()?;
        match guard.sessions.get(&activity.session_id) {
            None => {
                return Err(StorageError::ConstraintViolation(format!(
                    "unknown session {}",
                    activity.session_id
                )));
            }
            Some(session) if !session.is_open() => {
                return Err(StorageError::Conflict(format!(
                    "session {} is closed",
                    activity.session_id
                )));
            }
            Some(_) => {}
        }
        if !guard.catalog.contains_key(&activity.activity_id) {
            return Err(StorageError::ConstraintViolation(format!(
                "unknown activity {}",
                activity.activity_id
            )));
        }

        guard.last_activity_row_id += 1;
        let created = SessionActivity::from_new(
            SessionActivityId::new(guard.last_activity_row_id),
            activity.clone(),
        );
        guard.activities.insert(created.id(), created.clone());
        Ok(created)
    }

    async fn get_session_activity(
        &self,
        id: SessionActivityId,
    ) -> Result<SessionActivity, StorageError> {
        let guard = self.lock()?;
        guard
            .activities
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_session_activities(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionActivity>, StorageError> {
        let guard = self.lock()?;
        let mut found: Vec<SessionActivity> = guard
            .activities
            .values()
            .filter(|a| a.session_id() == session_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(found)
    }

    async fn update_session_activity(
        &self,
        activity: &SessionActivity,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let session_id = guard
            .activities
            .get(&activity.id())
            .map(SessionActivity::session_id)
            .ok_or(StorageError::NotFound)?;
        if !guard.sessions.get(&session_id).is_some_and(Session::is_open) {
            return Err(StorageError::Conflict(format!("session {session_id} is closed")));
        }
        guard.activities.insert(activity.id(), activity.clone());
        Ok(())
    }

    async fn delete_session_activity(&self, id: SessionActivityId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .activities
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn delete_session_activities(
        &self,
        session_id: SessionId,
    ) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.activities.len();
        guard.activities.retain(|_, a| a.session_id() != session_id);
        Ok((before - guard.activities.len()) as u64)
    }

    async fn delete_all_session_activities(&self) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let removed = guard.activities.len() as u64;
        guard.activities.clear();
        Ok(removed)
    }
}

#[async_trait]
impl ActivityCatalog for InMemoryRepository {
    async fn get_activity(&self, id: ActivityId) -> Result<Option<StudyActivity>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.catalog.get(&id).cloned())
    }

    async fn list_activities(&self) -> Result<Vec<StudyActivity>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.catalog.values().cloned().collect())
    }

    async fn insert_activity(
        &self,
        activity: &NewStudyActivity,
    ) -> Result<ActivityId, StorageError> {
        let mut guard = self.lock()?;
        if guard.catalog.values().any(|a| a.name == activity.name) {
            return Err(StorageError::Conflict(format!(
                "activity {:?} already exists",
                activity.name
            )));
        }
        guard.last_catalog_id += 1;
        let id = ActivityId::new(guard.last_catalog_id);
        guard.catalog.insert(
            id,
            StudyActivity {
                id,
                name: activity.name.clone(),
                description: activity.description.clone(),
                created_at: activity.created_at,
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl GroupDirectory for InMemoryRepository {
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.groups.get(&id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.groups.values().cloned().collect())
    }

    async fn insert_group(&self, group: &NewGroup) -> Result<GroupId, StorageError> {
        let mut guard = self.lock()?;
        if guard.groups.values().any(|g| g.name == group.name) {
            return Err(StorageError::Conflict(format!(
                "group {:?} already exists",
                group.name
            )));
        }
        guard.last_group_id += 1;
        let id = GroupId::new(guard.last_group_id);
        guard.groups.insert(
            id,
            Group {
                id,
                name: group.name.clone(),
                description: group.description.clone(),
                created_at: group.created_at,
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use portal_core::model::{ActivityResult, ActivityScore};
    use portal_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, ActivityId) {
        let repo = InMemoryRepository::new();
        let activity_id = repo
            .insert_activity(&NewStudyActivity {
                name: "Flashcards".into(),
                description: String::new(),
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        (repo, activity_id)
    }

    fn pending(session_id: SessionId, activity_id: ActivityId) -> NewSessionActivity {
        NewSessionActivity::new(session_id, activity_id, "hello", "नमस्ते", "", fixed_now())
            .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let (repo, activity_id) = seeded().await;
        let draft = NewSession::open(activity_id, None, fixed_now()).unwrap();
        let a = repo.create_session(&draft).await.unwrap();
        let b = repo.create_session(&draft).await.unwrap();
        assert_eq!(a.id(), SessionId::new(1));
        assert_eq!(b.id(), SessionId::new(2));
    }

    #[tokio::test]
    async fn create_rejects_invalid_draft() {
        let (repo, _) = seeded().await;
        let draft = NewSession {
            activity_id: ActivityId::new(0),
            group_id: None,
            start_time: fixed_now(),
            created_at: fixed_now(),
        };
        let err = repo.create_session(&draft).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_pages() {
        let (repo, activity_id) = seeded().await;
        for minutes in 0..3 {
            let at = fixed_now() + Duration::minutes(minutes);
            let draft = NewSession::open(activity_id, None, at).unwrap();
            repo.create_session(&draft).await.unwrap();
        }

        let page = repo.list_sessions(2, 0).await.unwrap();
        let ids: Vec<u64> = page.iter().map(|s| s.id().value()).collect();
        assert_eq!(ids, vec![3, 2]);

        let rest = repo.list_sessions(2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id(), SessionId::new(1));
        assert_eq!(repo.count_sessions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn deleting_referenced_sessions_is_a_constraint_violation() {
        let (repo, activity_id) = seeded().await;
        let draft = NewSession::open(activity_id, None, fixed_now()).unwrap();
        let session = repo.create_session(&draft).await.unwrap();
        repo.create_session_activity(&pending(session.id(), activity_id))
            .await
            .unwrap();

        let err = repo.delete_all_sessions().await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
        let err = repo.delete_session(session.id()).await.unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));

        assert_eq!(repo.delete_all_session_activities().await.unwrap(), 1);
        assert_eq!(repo.delete_all_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn activity_round_trips_evaluation() {
        let (repo, activity_id) = seeded().await;
        let draft = NewSession::open(activity_id, None, fixed_now()).unwrap();
        let session = repo.create_session(&draft).await.unwrap();
        let mut activity = repo
            .create_session_activity(&pending(session.id(), activity_id))
            .await
            .unwrap();

        activity.evaluate(ActivityResult::Success, ActivityScore::MAX);
        repo.update_session_activity(&activity).await.unwrap();

        let fetched = repo.get_session_activity(activity.id()).await.unwrap();
        assert_eq!(fetched, activity);
    }

    #[tokio::test]
    async fn activity_requires_existing_session() {
        let (repo, activity_id) = seeded().await;
        let err = repo
            .create_session_activity(&pending(SessionId::new(99), activity_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let (repo, _) = seeded().await;
        assert!(matches!(
            repo.get_session(SessionId::new(7)).await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            repo.delete_session_activity(SessionActivityId::new(7)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn closed_session_refuses_writes_under_the_lock() {
        let (repo, activity_id) = seeded().await;
        let draft = NewSession::open(activity_id, None, fixed_now()).unwrap();
        let session = repo.create_session(&draft).await.unwrap();
        let mut activity = repo
            .create_session_activity(&pending(session.id(), activity_id))
            .await
            .unwrap();

        let mut first = session.clone();
        first.close(fixed_now(), 25).unwrap();
        repo.close_session(&first).await.unwrap();

        let mut second = session.clone();
        second.close(fixed_now(), 75).unwrap();
        assert!(matches!(
            repo.close_session(&second).await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(repo.get_session(session.id()).await.unwrap().score(), 25);

        activity.evaluate(ActivityResult::Failure, ActivityScore::ZERO);
        assert!(matches!(
            repo.update_session_activity(&activity).await,
            Err(StorageError::Conflict(_))
        ));
        assert!(matches!(
            repo.create_session_activity(&pending(session.id(), activity_id)).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn writes_to_missing_rows_are_not_found() {
        let (repo, activity_id) = seeded().await;
        let draft = NewSession::open(activity_id, None, fixed_now()).unwrap();
        let session = repo.create_session(&draft).await.unwrap();
        let activity = repo
            .create_session_activity(&pending(session.id(), activity_id))
            .await
            .unwrap();
        repo.delete_session_activity(activity.id()).await.unwrap();
        repo.delete_session(session.id()).await.unwrap();

        let mut closed = session.clone();
        closed.close(fixed_now(), 10).unwrap();
        assert!(matches!(
            repo.close_session(&closed).await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            repo.update_session_activity(&activity).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_catalog_name_conflicts() {
        let (repo, _) = seeded().await;
        let err = repo
            .insert_activity(&NewStudyActivity {
                name: "Flashcards".into(),
                description: "again".into(),
                created_at: fixed_now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }
}
