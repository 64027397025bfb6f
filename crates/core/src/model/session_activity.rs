use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{ActivityId, SessionActivityId, SessionId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionActivityError {
    #[error("invalid session id: must be a positive number")]
    InvalidSessionId,

    #[error("invalid activity id: must be a positive number")]
    InvalidActivityId,

    #[error("challenge cannot be empty")]
    EmptyChallenge,

    #[error("answer cannot be empty")]
    EmptyAnswer,

    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(i64),

    #[error("unknown result label: {0:?}")]
    UnknownResult(String),
}

//
// ─── RESULT ───────────────────────────────────────────────────────────────────
//

/// Outcome of evaluating a learner's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityResult {
    Success,
    Failure,
}

impl ActivityResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityResult::Success => "success",
            ActivityResult::Failure => "failure",
        }
    }
}

impl fmt::Display for ActivityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityResult {
    type Err = SessionActivityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            _ => Err(SessionActivityError::UnknownResult(s.to_owned())),
        }
    }
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Per-answer score, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct ActivityScore(u8);

impl ActivityScore {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(100);

    /// # Errors
    ///
    /// Returns `SessionActivityError::ScoreOutOfRange` unless `0 <= value <= 100`.
    pub fn new(value: i64) -> Result<Self, SessionActivityError> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX.0 => Ok(Self(v)),
            _ => Err(SessionActivityError::ScoreOutOfRange(value)),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

//
// ─── NEW SESSION ACTIVITY ─────────────────────────────────────────────────────
//

/// An answered prompt that has not been persisted yet. Starts unevaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionActivity {
    pub session_id: SessionId,
    pub activity_id: ActivityId,
    pub challenge: String,
    pub answer: String,
    pub input: String,
    pub created_at: DateTime<Utc>,
}

impl NewSessionActivity {
    /// Build and validate a pending activity.
    ///
    /// # Errors
    ///
    /// See [`NewSessionActivity::validate`].
    pub fn new(
        session_id: SessionId,
        activity_id: ActivityId,
        challenge: impl Into<String>,
        answer: impl Into<String>,
        input: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionActivityError> {
        let draft = Self {
            session_id,
            activity_id,
            challenge: challenge.into(),
            answer: answer.into(),
            input: input.into(),
            created_at,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// # Errors
    ///
    /// Returns `SessionActivityError` for a zero id or a blank challenge/answer.
    pub fn validate(&self) -> Result<(), SessionActivityError> {
        if !self.session_id.is_valid() {
            return Err(SessionActivityError::InvalidSessionId);
        }
        if !self.activity_id.is_valid() {
            return Err(SessionActivityError::InvalidActivityId);
        }
        if self.challenge.trim().is_empty() {
            return Err(SessionActivityError::EmptyChallenge);
        }
        if self.answer.trim().is_empty() {
            return Err(SessionActivityError::EmptyAnswer);
        }
        Ok(())
    }
}

//
// ─── SESSION ACTIVITY ─────────────────────────────────────────────────────────
//

/// One prompt answered during a session, and its evaluation once scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionActivity {
    id: SessionActivityId,
    session_id: SessionId,
    activity_id: ActivityId,
    challenge: String,
    answer: String,
    input: String,
    result: Option<ActivityResult>,
    score: ActivityScore,
    created_at: DateTime<Utc>,
}

impl SessionActivity {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: SessionActivityId,
        session_id: SessionId,
        activity_id: ActivityId,
        challenge: String,
        answer: String,
        input: String,
        result: Option<ActivityResult>,
        score: ActivityScore,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            session_id,
            activity_id,
            challenge,
            answer,
            input,
            result,
            score,
            created_at,
        }
    }

    #[must_use]
    pub fn from_new(id: SessionActivityId, draft: NewSessionActivity) -> Self {
        Self {
            id,
            session_id: draft.session_id,
            activity_id: draft.activity_id,
            challenge: draft.challenge,
            answer: draft.answer,
            input: draft.input,
            result: None,
            score: ActivityScore::ZERO,
            created_at: draft.created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionActivityId {
        self.id
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn activity_id(&self) -> ActivityId {
        self.activity_id
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// `None` until the activity has been evaluated.
    #[must_use]
    pub fn result(&self) -> Option<ActivityResult> {
        self.result
    }

    #[must_use]
    pub fn score(&self) -> ActivityScore {
        self.score
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.result.is_some()
    }

    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.result == Some(ActivityResult::Success)
    }

    /// Record an evaluation. Re-evaluating replaces the previous outcome.
    pub fn evaluate(&mut self, result: ActivityResult, score: ActivityScore) {
        self.result = Some(result);
        self.score = score;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft() -> NewSessionActivity {
        NewSessionActivity::new(
            SessionId::new(1),
            ActivityId::new(5),
            "hello",
            "नमस्ते",
            "",
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn new_activity_is_pending() {
        let activity = SessionActivity::from_new(SessionActivityId::new(3), draft());
        assert_eq!(activity.result(), None);
        assert_eq!(activity.score(), ActivityScore::ZERO);
        assert!(!activity.is_evaluated());
        assert_eq!(activity.answer(), "नमस्ते");
        assert_eq!(activity.input(), "");
    }

    #[test]
    fn blank_challenge_and_answer_are_rejected() {
        let mut d = draft();
        d.challenge = "   ".into();
        assert_eq!(d.validate(), Err(SessionActivityError::EmptyChallenge));

        let mut d = draft();
        d.answer = String::new();
        assert_eq!(d.validate(), Err(SessionActivityError::EmptyAnswer));
    }

    #[test]
    fn zero_ids_are_rejected() {
        let mut d = draft();
        d.session_id = SessionId::new(0);
        assert_eq!(d.validate(), Err(SessionActivityError::InvalidSessionId));

        let mut d = draft();
        d.activity_id = ActivityId::new(0);
        assert_eq!(d.validate(), Err(SessionActivityError::InvalidActivityId));
    }

    #[test]
    fn score_bounds() {
        assert_eq!(ActivityScore::new(0).unwrap(), ActivityScore::ZERO);
        assert_eq!(ActivityScore::new(100).unwrap(), ActivityScore::MAX);
        assert_eq!(
            ActivityScore::new(101),
            Err(SessionActivityError::ScoreOutOfRange(101))
        );
        assert_eq!(
            ActivityScore::new(-1),
            Err(SessionActivityError::ScoreOutOfRange(-1))
        );
    }

    #[test]
    fn result_parses_case_insensitively() {
        assert_eq!(
            " Success ".parse::<ActivityResult>().unwrap(),
            ActivityResult::Success
        );
        assert_eq!(
            "FAILURE".parse::<ActivityResult>().unwrap(),
            ActivityResult::Failure
        );
        assert!(matches!(
            "maybe".parse::<ActivityResult>(),
            Err(SessionActivityError::UnknownResult(_))
        ));
    }

    #[test]
    fn evaluate_sets_result_and_score() {
        let mut activity = SessionActivity::from_new(SessionActivityId::new(3), draft());
        activity.evaluate(ActivityResult::Success, ActivityScore::MAX);
        assert!(activity.is_evaluated());
        assert!(activity.is_successful());
        assert_eq!(activity.score().value(), 100);
    }
}
