use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use study_core::model::{
    AnswerChoice, ProgressSnapshot, Question, TopicGroupDetail, TopicGroupId, TopicId,
    TopicWithQuestions, ValidatedQuestion,
};

use super::SqliteRepository;
use super::mapping::{
    bool_from_i64, choice_id_from_i64, id_to_i64, map_topic_group_row, map_topic_row,
    parse_choice_label, question_id_from_i64, ser, storage_error, topic_id_from_i64,
};
use crate::repository::{StorageError, TopicRepository};

const TOPIC_TREE_SELECT: &str = r"
    SELECT
        t.id AS topic_id, t.topic_group_id, t.name AS topic_name, t.completed,
        q.id AS question_id, q.statement,
        c.id AS choice_id, c.label, c.text, c.is_correct
    FROM topics t
    LEFT JOIN questions q ON q.topic_id = t.id
    LEFT JOIN answer_choices c ON c.question_id = q.id
";

const TOPIC_TREE_ORDER: &str = "ORDER BY t.id ASC, q.position ASC, q.id ASC, c.label ASC";

/// Folds flattened topic/question/choice rows back into a tree.
///
/// Rows must be ordered by topic, then question, so that children of one
/// parent are contiguous.
fn assemble_topics(rows: &[SqliteRow]) -> Result<Vec<TopicWithQuestions>, StorageError> {
    let mut topics: Vec<TopicWithQuestions> = Vec::new();

    for row in rows {
        let topic_id = topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?;
        if topics.last().is_none_or(|t| t.topic.id != topic_id) {
            topics.push(TopicWithQuestions {
                topic: map_topic_row(row)?,
                questions: Vec::new(),
            });
        }
        let Some(topic) = topics.last_mut() else {
            continue;
        };

        let Some(question_id) = row.try_get::<Option<i64>, _>("question_id").map_err(ser)? else {
            continue;
        };
        let question_id = question_id_from_i64(question_id)?;
        if topic.questions.last().is_none_or(|q| q.id != question_id) {
            topic.questions.push(Question {
                id: question_id,
                topic_id,
                statement: row.try_get("statement").map_err(ser)?,
                choices: Vec::new(),
            });
        }
        let Some(question) = topic.questions.last_mut() else {
            continue;
        };

        let Some(choice_id) = row.try_get::<Option<i64>, _>("choice_id").map_err(ser)? else {
            continue;
        };
        let label: String = row.try_get("label").map_err(ser)?;
        question.choices.push(AnswerChoice {
            id: choice_id_from_i64(choice_id)?,
            question_id,
            label: parse_choice_label(&label)?,
            text: row.try_get("text").map_err(ser)?,
            is_correct: bool_from_i64(
                "is_correct",
                row.try_get::<i64, _>("is_correct").map_err(ser)?,
            )?,
        });
    }

    Ok(topics)
}

fn count_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

#[async_trait::async_trait]
impl TopicRepository for SqliteRepository {
    async fn topic_exists(
        &self,
        group_id: TopicGroupId,
        name: &str,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM topics WHERE topic_group_id = ?1 AND name = ?2")
            .bind(id_to_i64("topic_group_id", group_id.value())?)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.is_some())
    }

    async fn commit_topic(
        &self,
        group_id: TopicGroupId,
        name: &str,
        questions: &[ValidatedQuestion],
    ) -> Result<TopicId, StorageError> {
        let group = id_to_i64("topic_group_id", group_id.value())?;
        // Dropping `tx` on any early return rolls back every row written so far.
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let topic_id = sqlx::query("INSERT INTO topics (topic_group_id, name) VALUES (?1, ?2)")
            .bind(group)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .last_insert_rowid();

        for (position, question) in questions.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("question position overflow".into()))?;
            let question_id = sqlx::query(
                r"
                INSERT INTO questions (topic_id, position, statement)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(topic_id)
            .bind(position)
            .bind(question.statement())
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?
            .last_insert_rowid();

            for (label, text) in question.choices() {
                sqlx::query(
                    r"
                    INSERT INTO answer_choices (question_id, label, text, is_correct)
                    VALUES (?1, ?2, ?3, ?4)
                    ",
                )
                .bind(question_id)
                .bind(label.as_str())
                .bind(text.as_str())
                .bind(i64::from(question.is_correct(*label)))
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
            }
        }

        tx.commit().await.map_err(storage_error)?;
        tracing::debug!(
            topic_id,
            %group_id,
            questions = questions.len(),
            "committed topic"
        );
        topic_id_from_i64(topic_id)
    }

    async fn mark_topic_completed(
        &self,
        topic_id: TopicId,
    ) -> Result<ProgressSnapshot, StorageError> {
        let topic = id_to_i64("topic_id", topic_id.value())?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // Writing first takes the database write lock, so the counts read
        // below cannot be invalidated by a concurrent completion.
        let group = sqlx::query_scalar::<_, i64>(
            "UPDATE topics SET completed = 1 WHERE id = ?1 RETURNING topic_group_id",
        )
        .bind(topic)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or(StorageError::NotFound)?;

        let counts = sqlx::query(
            r"
            SELECT COUNT(*) AS total, COALESCE(SUM(completed), 0) AS completed
            FROM topics
            WHERE topic_group_id = ?1
            ",
        )
        .bind(group)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_error)?;

        let snapshot = ProgressSnapshot::new(
            count_from_i64("total", counts.try_get::<i64, _>("total").map_err(ser)?)?,
            count_from_i64("completed", counts.try_get::<i64, _>("completed").map_err(ser)?)?,
        );

        sqlx::query("UPDATE topic_groups SET progress = ?1 WHERE id = ?2")
            .bind(snapshot.progress)
            .bind(group)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(snapshot)
    }

    async fn fetch_topic_group_detail(
        &self,
        group_id: TopicGroupId,
    ) -> Result<Option<TopicGroupDetail>, StorageError> {
        let group = id_to_i64("topic_group_id", group_id.value())?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let Some(group_row) =
            sqlx::query("SELECT id, subject_id, name, progress FROM topic_groups WHERE id = ?1")
                .bind(group)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error)?
        else {
            return Ok(None);
        };

        let sql = format!("{TOPIC_TREE_SELECT} WHERE t.topic_group_id = ?1 {TOPIC_TREE_ORDER}");
        let rows = sqlx::query(&sql)
            .bind(group)
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;

        Ok(Some(TopicGroupDetail {
            topic_group: map_topic_group_row(&group_row)?,
            topics: assemble_topics(&rows)?,
        }))
    }

    async fn fetch_topic(
        &self,
        topic_id: TopicId,
    ) -> Result<Option<TopicWithQuestions>, StorageError> {
        let sql = format!("{TOPIC_TREE_SELECT} WHERE t.id = ?1 {TOPIC_TREE_ORDER}");
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("topic_id", topic_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(assemble_topics(&rows)?.into_iter().next())
    }
}
