use storage::repository::TransactionalPurge;

use super::service::SessionLifecycleService;
use crate::error::SessionServiceError;

/// Row counts removed by [`SessionLifecycleService::delete_all_sessions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PurgeOutcome {
    pub sessions_deleted: u64,
    pub activities_deleted: u64,
}

impl PurgeOutcome {
    /// True when there was nothing to delete.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.sessions_deleted == 0 && self.activities_deleted == 0
    }
}

impl SessionLifecycleService {
    /// Delete every session activity, then every session.
    ///
    /// With a transactional backend both deletes commit or roll back together.
    /// Otherwise they run as two phases, and a failure in the second phase is
    /// reported as `PartialPurge` carrying how many activities were already gone.
    ///
    /// # Errors
    ///
    /// `Persistence` if the activity phase fails, `PartialPurge` if only the
    /// session phase fails on a non-transactional backend.
    #[tracing::instrument(skip(self))]
    pub async fn delete_all_sessions(&self) -> Result<PurgeOutcome, SessionServiceError> {
        let outcome = match &self.purge {
            Some(purge) => purge_in_transaction(purge.as_ref()).await?,
            None => self.purge_in_phases().await?,
        };
        if outcome.is_noop() {
            tracing::debug!("no sessions to delete");
        } else {
            tracing::info!(
                sessions_deleted = outcome.sessions_deleted,
                activities_deleted = outcome.activities_deleted,
                "all sessions deleted"
            );
        }
        Ok(outcome)
    }

    async fn purge_in_phases(&self) -> Result<PurgeOutcome, SessionServiceError> {
        let activities_deleted = self
            .activities
            .delete_all_session_activities()
            .await
            .map_err(|e| SessionServiceError::storage("delete all session activities", e))?;

        match self.sessions.delete_all_sessions().await {
            Ok(sessions_deleted) => Ok(PurgeOutcome {
                sessions_deleted,
                activities_deleted,
            }),
            Err(source) => {
                tracing::error!(
                    activities_deleted,
                    error = %source,
                    "session phase of purge failed"
                );
                Err(SessionServiceError::PartialPurge {
                    activities_deleted,
                    source,
                })
            }
        }
    }
}

async fn purge_in_transaction(
    purge: &dyn TransactionalPurge,
) -> Result<PurgeOutcome, SessionServiceError> {
    let mut unit = purge
        .begin_purge()
        .await
        .map_err(|e| SessionServiceError::storage("begin purge", e))?;

    // An early return drops `unit`, which rolls the transaction back.
    let activities_deleted = unit
        .delete_all_session_activities()
        .await
        .map_err(|e| SessionServiceError::storage("delete all session activities", e))?;
    let sessions_deleted = unit
        .delete_all_sessions()
        .await
        .map_err(|e| SessionServiceError::storage("delete all sessions", e))?;
    unit.commit()
        .await
        .map_err(|e| SessionServiceError::storage("commit purge", e))?;

    Ok(PurgeOutcome {
        sessions_deleted,
        activities_deleted,
    })
}
