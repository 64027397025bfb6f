use portal_core::model::{
    ActivityId, ActivityResult, ActivityScore, Group, GroupId, Session, SessionActivity,
    SessionActivityId, SessionId, StudyActivity,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Classify a driver error: constraint failures keep their own variants so
/// callers can tell them apart from outages.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_foreign_key_violation() || db.is_check_violation() {
            return StorageError::ConstraintViolation(db.message().to_owned());
        }
        if db.is_unique_violation() {
            return StorageError::Conflict(db.message().to_owned());
        }
    }
    tracing::warn!(error = %e, "sqlite statement failed");
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn session_activity_id_from_i64(v: i64) -> Result<SessionActivityId, StorageError> {
    Ok(SessionActivityId::new(i64_to_u64("session_activity_id", v)?))
}

pub(crate) fn activity_id_from_i64(v: i64) -> Result<ActivityId, StorageError> {
    Ok(ActivityId::new(i64_to_u64("activity_id", v)?))
}

pub(crate) fn group_id_from_i64(v: i64) -> Result<GroupId, StorageError> {
    Ok(GroupId::new(i64_to_u64("group_id", v)?))
}

pub(crate) fn result_to_db(result: Option<ActivityResult>) -> Option<&'static str> {
    result.map(ActivityResult::as_str)
}

/// Empty strings are treated as "not evaluated" alongside NULL.
pub(crate) fn result_from_db(raw: Option<String>) -> Result<Option<ActivityResult>, StorageError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(ser),
    }
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<Session, StorageError> {
    let score: i64 = row.try_get("score").map_err(ser)?;
    let score = u32::try_from(score)
        .map_err(|_| StorageError::Serialization(format!("invalid session score: {score}")))?;

    Session::from_persisted(
        session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        activity_id_from_i64(row.try_get::<i64, _>("activity_id").map_err(ser)?)?,
        row.try_get::<Option<i64>, _>("group_id")
            .map_err(ser)?
            .map(group_id_from_i64)
            .transpose()?,
        row.try_get("start_time").map_err(ser)?,
        row.try_get("end_time").map_err(ser)?,
        score,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_activity_row(row: &SqliteRow) -> Result<SessionActivity, StorageError> {
    let score = ActivityScore::new(row.try_get::<i64, _>("score").map_err(ser)?).map_err(ser)?;

    Ok(SessionActivity::from_persisted(
        session_activity_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        activity_id_from_i64(row.try_get::<i64, _>("activity_id").map_err(ser)?)?,
        row.try_get("challenge").map_err(ser)?,
        row.try_get("answer").map_err(ser)?,
        row.try_get("input").map_err(ser)?,
        result_from_db(row.try_get("result").map_err(ser)?)?,
        score,
        row.try_get("created_at").map_err(ser)?,
    ))
}

pub(crate) fn map_study_activity_row(row: &SqliteRow) -> Result<StudyActivity, StorageError> {
    Ok(StudyActivity {
        id: activity_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_group_row(row: &SqliteRow) -> Result<Group, StorageError> {
    Ok(Group {
        id: group_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_result_reads_as_pending() {
        assert_eq!(result_from_db(None).unwrap(), None);
        assert_eq!(result_from_db(Some(String::new())).unwrap(), None);
    }

    #[test]
    fn stored_result_labels_parse() {
        assert_eq!(
            result_from_db(Some("success".into())).unwrap(),
            Some(ActivityResult::Success)
        );
        assert!(result_from_db(Some("partial".into())).is_err());
    }

    #[test]
    fn negative_row_ids_are_rejected() {
        assert!(session_id_from_i64(-1).is_err());
        assert_eq!(group_id_from_i64(4).unwrap(), GroupId::new(4));
    }
}
