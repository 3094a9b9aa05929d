use sqlx::Row;
use study_core::model::{SubjectId, SubjectOverview, TopicGroupId};

use super::SqliteRepository;
use super::mapping::{
    id_to_i64, map_subject_row, map_topic_group_row, ser, storage_error, subject_id_from_i64,
    topic_group_id_from_i64,
};
use crate::repository::{StorageError, SubjectRepository};

#[async_trait::async_trait]
impl SubjectRepository for SqliteRepository {
    async fn ensure_subject(&self, name: &str) -> Result<SubjectId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // The UNIQUE constraint on name settles races between concurrent callers.
        sqlx::query("INSERT INTO subjects (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM subjects WHERE name = ?1")
            .bind(name)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        subject_id_from_i64(id)
    }

    async fn create_subject(&self, name: &str) -> Result<SubjectId, StorageError> {
        let res = sqlx::query("INSERT INTO subjects (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        subject_id_from_i64(res.last_insert_rowid())
    }

    async fn delete_subject(&self, id: SubjectId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM subjects WHERE id = ?1")
            .bind(id_to_i64("subject_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        tracing::debug!(%id, "deleted subject");
        Ok(())
    }

    async fn ensure_topic_group(
        &self,
        subject_id: SubjectId,
        name: &str,
    ) -> Result<TopicGroupId, StorageError> {
        let subject = id_to_i64("subject_id", subject_id.value())?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r"
            INSERT INTO topic_groups (subject_id, name)
            VALUES (?1, ?2)
            ON CONFLICT(subject_id, name) DO NOTHING
            ",
        )
        .bind(subject)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM topic_groups WHERE subject_id = ?1 AND name = ?2",
        )
        .bind(subject)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        topic_group_id_from_i64(id)
    }

    async fn list_subject_names(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT name FROM subjects ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(ser))
            .collect()
    }

    async fn list_subjects_with_topic_groups(&self) -> Result<Vec<SubjectOverview>, StorageError> {
        // One read transaction so subjects and groups come from the same snapshot.
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let subjects = sqlx::query("SELECT id, name FROM subjects ORDER BY id ASC")
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_error)?;
        let groups = sqlx::query(
            r"
            SELECT id, subject_id, name, progress
            FROM topic_groups
            ORDER BY subject_id ASC, id ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;

        let mut overviews = Vec::with_capacity(subjects.len());
        for row in &subjects {
            overviews.push(SubjectOverview {
                subject: map_subject_row(row)?,
                topic_groups: Vec::new(),
            });
        }
        for row in &groups {
            let group = map_topic_group_row(row)?;
            if let Some(overview) = overviews
                .iter_mut()
                .find(|o| o.subject.id == group.subject_id)
            {
                overview.topic_groups.push(group);
            }
        }
        Ok(overviews)
    }
}
