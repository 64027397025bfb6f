use sqlx::{Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::db_err;
use crate::repository::{PurgeUnit, StorageError, TransactionalPurge};

/// A bulk delete running inside one `SQLite` transaction.
///
/// Dropping the unit before `commit` rolls the transaction back.
pub struct SqlitePurgeUnit {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqlitePurgeUnit {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StorageError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StorageError::Connection("purge transaction already finished".into()))
    }
}

#[async_trait::async_trait]
impl PurgeUnit for SqlitePurgeUnit {
    async fn delete_all_session_activities(&mut self) -> Result<u64, StorageError> {
        let tx = self.tx()?;
        let res = sqlx::query("DELETE FROM session_activities")
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn delete_all_sessions(&mut self) -> Result<u64, StorageError> {
        let tx = self.tx()?;
        let res = sqlx::query("DELETE FROM sessions")
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StorageError::Connection("purge transaction already finished".into()))?;
        tx.commit().await.map_err(db_err)
    }
}

#[async_trait::async_trait]
impl TransactionalPurge for SqliteRepository {
    async fn begin_purge(&self) -> Result<Box<dyn PurgeUnit>, StorageError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(SqlitePurgeUnit { tx: Some(tx) }))
    }
}
