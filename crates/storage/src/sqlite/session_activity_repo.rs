use portal_core::model::{NewSessionActivity, SessionActivity, SessionActivityId, SessionId};

use super::SqliteRepository;
use super::mapping::{
    db_err, id_i64, map_session_activity_row, result_to_db, session_activity_id_from_i64,
};
use crate::repository::{SessionActivityRepository, StorageError};

const ACTIVITY_COLUMNS: &str =
    "id, session_id, activity_id, challenge, answer, input, result, score, created_at";

#[async_trait::async_trait]
impl SessionActivityRepository for SqliteRepository {
    async fn create_session_activity(
        &self,
        activity: &NewSessionActivity,
    ) -> Result<SessionActivity, StorageError> {
        activity.validate().map_err(StorageError::validation)?;
        let session_id = id_i64("session_id", activity.session_id.value())?;

        let res = sqlx::query(
            r"
                INSERT INTO session_activities
                    (session_id, activity_id, challenge, answer, input, result, score, created_at)
                SELECT ?1, ?2, ?3, ?4, ?5, NULL, 0, ?6
                WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ?1 AND end_time IS NULL)
            ",
        )
        .bind(session_id)
        .bind(id_i64("activity_id", activity.activity_id.value())?)
        .bind(&activity.challenge)
        .bind(&activity.answer)
        .bind(&activity.input)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(if self.session_exists(session_id).await? {
                StorageError::Conflict(format!("session {session_id} is closed"))
            } else {
                StorageError::ConstraintViolation(format!("unknown session {session_id}"))
            });
        }
        let id = session_activity_id_from_i64(res.last_insert_rowid())?;
        Ok(SessionActivity::from_new(id, activity.clone()))
    }

    async fn get_session_activity(
        &self,
        id: SessionActivityId,
    ) -> Result<SessionActivity, StorageError> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM session_activities WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_activity_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;

        map_session_activity_row(&row)
    }

    async fn list_session_activities(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionActivity>, StorageError> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM session_activities WHERE session_id = ?1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("session_id", session_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_activity_row(&row)?);
        }
        Ok(out)
    }

    async fn update_session_activity(
        &self,
        activity: &SessionActivity,
    ) -> Result<(), StorageError> {
        let id = id_i64("session_activity_id", activity.id().value())?;
        let res = sqlx::query(
            r"
                UPDATE session_activities
                SET input = ?1, result = ?2, score = ?3
                WHERE id = ?4
                  AND EXISTS (
                      SELECT 1 FROM sessions s
                      WHERE s.id = session_activities.session_id AND s.end_time IS NULL
                  )
            ",
        )
        .bind(activity.input())
        .bind(result_to_db(activity.result()))
        .bind(i64::from(activity.score().value()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            let owner = sqlx::query("SELECT session_id FROM session_activities WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            return Err(match owner {
                Some(_) => StorageError::Conflict(format!("session of activity {id} is closed")),
                None => StorageError::NotFound,
            });
        }
        Ok(())
    }

    async fn delete_session_activity(&self, id: SessionActivityId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM session_activities WHERE id = ?1")
            .bind(id_i64("session_activity_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_session_activities(
        &self,
        session_id: SessionId,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM session_activities WHERE session_id = ?1")
            .bind(id_i64("session_id", session_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn delete_all_session_activities(&self) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM session_activities")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}
