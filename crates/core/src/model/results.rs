use serde::Serialize;

use crate::model::{ActivityResult, Session, SessionActivity};

/// A session together with its activities and a score aggregate computed on read.
///
/// Nothing here is persisted; `Session::score` remains the caller-supplied
/// final score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResults {
    pub session: Session,
    pub activities: Vec<SessionActivity>,
    pub evaluated: usize,
    pub successes: usize,
    pub failures: usize,
    pub pending: usize,
    /// Mean score over evaluated activities; `None` if none are evaluated.
    pub average_score: Option<f64>,
}

impl SessionResults {
    #[must_use]
    pub fn from_activities(session: Session, activities: Vec<SessionActivity>) -> Self {
        let mut successes = 0_usize;
        let mut failures = 0_usize;
        let mut total = 0_u64;

        for activity in &activities {
            match activity.result() {
                Some(ActivityResult::Success) => successes += 1,
                Some(ActivityResult::Failure) => failures += 1,
                None => continue,
            }
            total += u64::from(activity.score().value());
        }

        let evaluated = successes + failures;
        #[allow(clippy::cast_precision_loss)]
        let average_score = (evaluated > 0).then(|| total as f64 / evaluated as f64);

        Self {
            pending: activities.len() - evaluated,
            session,
            activities,
            evaluated,
            successes,
            failures,
            average_score,
        }
    }
}
