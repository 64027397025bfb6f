use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ActivityId, GroupId, SessionId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("invalid activity id: must be a positive number")]
    InvalidActivityId,

    #[error("invalid group id: must be a positive number")]
    InvalidGroupId,

    #[error("invalid start time: time cannot be zero")]
    MissingStartTime,

    #[error("invalid time range: end time must not precede start time")]
    InvalidTimeRange,

    #[error("invalid score: score cannot be negative (got {0})")]
    NegativeScore(i64),

    #[error("invalid score: {0} does not fit the session score range")]
    ScoreOverflow(i64),

    #[error("session is already closed")]
    AlreadyClosed,
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Lifecycle state, derived from whether `end_time` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

//
// ─── NEW SESSION ──────────────────────────────────────────────────────────────
//

/// A session that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub activity_id: ActivityId,
    pub group_id: Option<GroupId>,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewSession {
    /// Start a session for `activity_id` at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the ids or timestamp are invalid.
    pub fn open(
        activity_id: ActivityId,
        group_id: Option<GroupId>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let draft = Self {
            activity_id,
            group_id,
            start_time: now,
            created_at: now,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Check the invariants a store requires before inserting.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidActivityId`, `SessionError::InvalidGroupId`
    /// or `SessionError::MissingStartTime`.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !self.activity_id.is_valid() {
            return Err(SessionError::InvalidActivityId);
        }
        if self.group_id.is_some_and(|g| !g.is_valid()) {
            return Err(SessionError::InvalidGroupId);
        }
        if is_zero_time(self.start_time) {
            return Err(SessionError::MissingStartTime);
        }
        Ok(())
    }
}

/// The Unix epoch (and anything before it) stands in for "unset".
fn is_zero_time(at: DateTime<Utc>) -> bool {
    at <= DateTime::<Utc>::UNIX_EPOCH
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One learner attempt at a catalog activity.
///
/// A session is open while `end_time` is `None`. Closing is one-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    id: SessionId,
    activity_id: ActivityId,
    group_id: Option<GroupId>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    score: u32,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTimeRange` if `end_time` precedes `start_time`.
    pub fn from_persisted(
        id: SessionId,
        activity_id: ActivityId,
        group_id: Option<GroupId>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        score: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if end_time.is_some_and(|end| end < start_time) {
            return Err(SessionError::InvalidTimeRange);
        }
        Ok(Self {
            id,
            activity_id,
            group_id,
            start_time,
            end_time,
            score,
            created_at,
        })
    }

    /// Attach a store-assigned id to a freshly inserted draft.
    #[must_use]
    pub fn from_new(id: SessionId, draft: &NewSession) -> Self {
        Self {
            id,
            activity_id: draft.activity_id,
            group_id: draft.group_id,
            start_time: draft.start_time,
            end_time: None,
            score: 0,
            created_at: draft.created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn activity_id(&self) -> ActivityId {
        self.activity_id
    }

    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Final score; always 0 while the session is open.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.is_open() {
            SessionStatus::Open
        } else {
            SessionStatus::Closed
        }
    }

    /// Elapsed time between start and end, once closed.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Close the session at `at` with a caller-supplied final score.
    ///
    /// Nothing is modified when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyClosed` if `end_time` is already set,
    /// `SessionError::NegativeScore` / `SessionError::ScoreOverflow` for an
    /// unrepresentable score, and `SessionError::InvalidTimeRange` if `at`
    /// precedes `start_time`.
    pub fn close(&mut self, at: DateTime<Utc>, score: i64) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::AlreadyClosed);
        }
        if score < 0 {
            return Err(SessionError::NegativeScore(score));
        }
        let score = u32::try_from(score).map_err(|_| SessionError::ScoreOverflow(score))?;
        if at < self.start_time {
            return Err(SessionError::InvalidTimeRange);
        }

        self.end_time = Some(at);
        self.score = score;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn open_session() -> Session {
        let draft = NewSession::open(ActivityId::new(5), None, fixed_now()).unwrap();
        Session::from_new(SessionId::new(1), &draft)
    }

    #[test]
    fn new_session_starts_open_with_zero_score() {
        let session = open_session();
        assert!(session.is_open());
        assert_eq!(session.status(), SessionStatus::Open);
        assert_eq!(session.score(), 0);
        assert_eq!(session.end_time(), None);
        assert_eq!(session.duration(), None);
    }

    #[test]
    fn open_rejects_zero_activity_id() {
        let err = NewSession::open(ActivityId::new(0), None, fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::InvalidActivityId);
    }

    #[test]
    fn open_rejects_zero_group_id() {
        let err =
            NewSession::open(ActivityId::new(1), Some(GroupId::new(0)), fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::InvalidGroupId);
    }

    #[test]
    fn validate_rejects_epoch_start_time() {
        let draft = NewSession {
            activity_id: ActivityId::new(1),
            group_id: None,
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            created_at: fixed_now(),
        };
        assert_eq!(draft.validate(), Err(SessionError::MissingStartTime));
    }

    #[test]
    fn close_sets_end_time_and_score() {
        let mut session = open_session();
        let later = fixed_now() + Duration::minutes(3);
        session.close(later, 80).unwrap();

        assert_eq!(session.status(), SessionStatus::Closed);
        assert_eq!(session.end_time(), Some(later));
        assert_eq!(session.score(), 80);
        assert_eq!(session.duration(), Some(Duration::minutes(3)));
    }

    #[test]
    fn close_twice_is_rejected_and_keeps_first_values() {
        let mut session = open_session();
        session.close(fixed_now(), 80).unwrap();

        let err = session
            .close(fixed_now() + Duration::minutes(1), 10)
            .unwrap_err();
        assert_eq!(err, SessionError::AlreadyClosed);
        assert_eq!(session.score(), 80);
        assert_eq!(session.end_time(), Some(fixed_now()));
    }

    #[test]
    fn close_rejects_negative_score_without_mutating() {
        let mut session = open_session();
        let err = session.close(fixed_now(), -1).unwrap_err();
        assert_eq!(err, SessionError::NegativeScore(-1));
        assert!(session.is_open());
    }

    #[test]
    fn close_rejects_end_before_start() {
        let mut session = open_session();
        let err = session
            .close(fixed_now() - Duration::seconds(1), 10)
            .unwrap_err();
        assert_eq!(err, SessionError::InvalidTimeRange);
        assert!(session.is_open());
    }

    #[test]
    fn from_persisted_rejects_inverted_range() {
        let now = fixed_now();
        let err = Session::from_persisted(
            SessionId::new(1),
            ActivityId::new(1),
            None,
            now,
            Some(now - Duration::hours(1)),
            0,
            now,
        )
        .unwrap_err();
        assert_eq!(err, SessionError::InvalidTimeRange);
    }
}
