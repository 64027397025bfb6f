use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{ActivityId, GroupId};

/// A reusable study-activity definition, e.g. "Flashcards".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyActivity {
    pub id: ActivityId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudyActivity {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A named collection of words that can scope a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
