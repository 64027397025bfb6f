use portal_core::model::{NewSession, Session, SessionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_session_row, ser, session_id_from_i64};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str = "id, activity_id, group_id, start_time, end_time, score, created_at";

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session, StorageError> {
        session.validate().map_err(StorageError::validation)?;
        let group_id = session
            .group_id
            .map(|g| id_i64("group_id", g.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
                INSERT INTO sessions (activity_id, group_id, start_time, end_time, score, created_at)
                VALUES (?1, ?2, ?3, NULL, 0, ?4)
            ",
        )
        .bind(id_i64("activity_id", session.activity_id.value())?)
        .bind(group_id)
        .bind(session.start_time)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = session_id_from_i64(res.last_insert_rowid())?;
        Ok(Session::from_new(id, session))
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn close_session(&self, session: &Session) -> Result<(), StorageError> {
        let id = id_i64("session_id", session.id().value())?;
        let res = sqlx::query(
            r"
                UPDATE sessions
                SET end_time = ?1, score = ?2
                WHERE id = ?3 AND end_time IS NULL
            ",
        )
        .bind(session.end_time())
        .bind(i64::from(session.score()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(if self.session_exists(id).await? {
                StorageError::Conflict(format!("session {id} is closed"))
            } else {
                StorageError::NotFound
            });
        }
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id_i64("session_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_sessions(&self, limit: u32, offset: u64) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .bind(id_i64("offset", offset)?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_session_row(&row)?);
        }
        Ok(out)
    }

    async fn count_sessions(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let total: i64 = row.try_get("total").map_err(ser)?;
        u64::try_from(total).map_err(ser)
    }

    async fn delete_all_sessions(&self) -> Result<u64, StorageError> {
        let res = sqlx::query("DELETE FROM sessions")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }
}

impl SqliteRepository {
    /// Explains a guarded write that matched no rows.
    pub(super) async fn session_exists(&self, id: i64) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }
}
