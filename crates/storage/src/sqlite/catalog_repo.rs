use portal_core::model::{ActivityId, Group, GroupId, NewGroup, NewStudyActivity, StudyActivity};

use super::SqliteRepository;
use super::mapping::{
    activity_id_from_i64, db_err, group_id_from_i64, id_i64, map_group_row,
    map_study_activity_row,
};
use crate::repository::{ActivityCatalog, GroupDirectory, StorageError};

#[async_trait::async_trait]
impl ActivityCatalog for SqliteRepository {
    async fn get_activity(&self, id: ActivityId) -> Result<Option<StudyActivity>, StorageError> {
        let row = sqlx::query(
            "SELECT id, name, description, created_at FROM study_activities WHERE id = ?1",
        )
        .bind(id_i64("activity_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_study_activity_row).transpose()
    }

    async fn list_activities(&self) -> Result<Vec<StudyActivity>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at FROM study_activities ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_study_activity_row).collect()
    }

    async fn insert_activity(
        &self,
        activity: &NewStudyActivity,
    ) -> Result<ActivityId, StorageError> {
        let res = sqlx::query(
            "INSERT INTO study_activities (name, description, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&activity.name)
        .bind(&activity.description)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        activity_id_from_i64(res.last_insert_rowid())
    }
}

#[async_trait::async_trait]
impl GroupDirectory for SqliteRepository {
    async fn get_group(&self, id: GroupId) -> Result<Option<Group>, StorageError> {
        let row =
            sqlx::query("SELECT id, name, description, created_at FROM groups WHERE id = ?1")
                .bind(id_i64("group_id", id.value())?)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.as_ref().map(map_group_row).transpose()
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(map_group_row).collect()
    }

    async fn insert_group(&self, group: &NewGroup) -> Result<GroupId, StorageError> {
        let res =
            sqlx::query("INSERT INTO groups (name, description, created_at) VALUES (?1, ?2, ?3)")
                .bind(&group.name)
                .bind(&group.description)
                .bind(group.created_at)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        group_id_from_i64(res.last_insert_rowid())
    }
}
